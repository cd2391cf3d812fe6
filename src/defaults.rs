//! Default generators.
//!
//! `bool`, `int`, `nat`, `word2`, `word4`, `word8`, `char` and `str` are leaves.
//! `List`, `Option` and `Tuple` are constructors and receive their element types
//! as parameters. Every generator here is layered: the output at depth `d`
//! starts with the complete output at depth `d - 1`.

use crate::error::{EngineError, EngineResult};
use crate::registry::Registry;
use crate::strategy::{failing, Draws, Gen, Strategy};
use crate::tuples::Tuples;
use crate::typeable::{TypeDescriptor, TypeExpr};
use crate::value::Value;
use std::iter;
use std::sync::Arc;

pub(crate) fn install(registry: &Registry) {
    registry.insert("bool", Arc::new(Bools));
    registry.insert("int", Arc::new(Ints));
    registry.insert("nat", Arc::new(Nats));
    registry.insert("word2", Arc::new(Words { bits: 2 }));
    registry.insert("word4", Arc::new(Words { bits: 4 }));
    registry.insert("word8", Arc::new(Words { bits: 8 }));
    registry.insert("char", Arc::new(Chars));
    registry.insert("str", Arc::new(Strs));
    registry.insert("List", Arc::new(Lists));
    registry.insert("Option", Arc::new(Options));
    registry.insert("Tuple", Arc::new(Products));
}

fn expect_params<'p>(
    name: &str,
    params: &'p [Arc<TypeDescriptor>],
    count: Option<usize>,
) -> EngineResult<&'p [Arc<TypeDescriptor>]> {
    let ok = match count {
        Some(n) => params.len() == n,
        None => !params.is_empty(),
    };
    if ok {
        Ok(params)
    } else {
        Err(EngineError::Generation {
            ty: name.to_string(),
            message: format!("unexpected number of type parameters: {}", params.len()),
        })
    }
}

struct Bools;

impl Strategy for Bools {
    fn name(&self) -> String {
        "bool".to_string()
    }

    fn generate<'r>(&self, _gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        Box::new([false, true].into_iter().map(|b| Ok(Value::Bool(b))))
    }
}

/// `0, -1, 1, ..., -d, d`
struct Ints;

impl Strategy for Ints {
    fn name(&self) -> String {
        "int".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        let depth = gen.depth() as i64;
        Box::new(
            iter::once(0)
                .chain((1..=depth).flat_map(|i| [-i, i]))
                .map(|i| Ok(Value::Int(i))),
        )
    }
}

struct Nats;

impl Strategy for Nats {
    fn name(&self) -> String {
        "nat".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        Box::new((0..gen.depth() as i64).map(|i| Ok(Value::Int(i))))
    }
}

/// Unsigned words of `bits` width, saturating at `2^bits` values.
struct Words {
    bits: u32,
}

impl Strategy for Words {
    fn name(&self) -> String {
        format!("word{}", self.bits)
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        let limit = (gen.depth() as i64).min(1 << self.bits);
        Box::new((0..limit).map(|i| Ok(Value::Int(i))))
    }
}

struct Chars;

impl Strategy for Chars {
    fn name(&self) -> String {
        "char".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        Box::new(('a'..='z').take(gen.depth()).map(|c| Ok(Value::Char(c))))
    }
}

struct Strs;

impl Strategy for Strs {
    fn name(&self) -> String {
        "str".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, _params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        let chars = match gen.registry().resolve(&TypeExpr::named("char")) {
            Ok(desc) => desc,
            Err(e) => return failing(e),
        };
        Box::new(sequences(gen, &chars).map(|draw| {
            let text = draw?
                .as_seq()?
                .iter()
                .map(Value::as_char)
                .collect::<EngineResult<String>>()?;
            Ok(Value::Str(text))
        }))
    }
}

struct Lists;

impl Strategy for Lists {
    fn name(&self) -> String {
        "List".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        match expect_params("List", params, Some(1)) {
            Ok(params) => sequences(gen, &params[0]),
            Err(e) => failing(e),
        }
    }
}

/// Sequences of `elem`: the empty sequence, then one layer per depth `e` of
/// `head : tail` with heads at depth `e` and tails at depth `e - 1`.
pub fn sequences<'r>(gen: &Gen<'r>, elem: &Arc<TypeDescriptor>) -> Draws<'r> {
    if gen.depth() == 0 {
        return Box::new(iter::empty());
    }
    let layers = {
        let gen = gen.clone();
        let elem = elem.clone();
        (2..=gen.depth()).flat_map(move |e| cons_layer(&gen, &elem, e))
    };
    Box::new(iter::once(Ok(Value::Seq(Vec::new()))).chain(layers))
}

fn cons_layer<'r>(gen: &Gen<'r>, elem: &Arc<TypeDescriptor>, e: usize) -> Draws<'r> {
    // The previous layer covered heads at e - 1 against tails at e - 2.
    let key = format!("sequences:{}", elem.identity());
    let floor = vec![
        gen.count_slots(elem, e - 1),
        gen.count_with(&key, e - 2, |g| sequences(g, elem)),
    ];
    let heads = gen.at(e).slots(elem);
    let tails = sequences(&gen.at(e - 1), elem);
    Box::new(Tuples::new(vec![heads, tails]).outside(floor).map(|pair| {
        let mut pair = pair.into_iter();
        match (pair.next(), pair.next()) {
            (Some(head), Some(tail)) => {
                let head = head?;
                let mut items = vec![head];
                items.extend_from_slice(tail?.as_seq()?);
                Ok(Value::Seq(items))
            }
            _ => Err(EngineError::fault("malformed cons pair")),
        }
    }))
}

struct Options;

impl Strategy for Options {
    fn name(&self) -> String {
        "Option".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        let inner = match expect_params("Option", params, Some(1)) {
            Ok(params) => params[0].clone(),
            Err(e) => return failing(e),
        };
        let some = gen
            .at(gen.depth().saturating_sub(1))
            .slots(&inner)
            .map(|draw| draw.map(|v| Value::Opt(Some(Box::new(v)))));
        Box::new(iter::once(Ok(Value::Opt(None))).chain(some))
    }
}

/// Tuples of one or more parameter types, layered by depth.
struct Products;

impl Strategy for Products {
    fn name(&self) -> String {
        "Tuple".to_string()
    }

    fn generate<'r>(&self, gen: &Gen<'r>, params: &[Arc<TypeDescriptor>]) -> Draws<'r> {
        let params = match expect_params("Tuple", params, None) {
            Ok(params) => params.to_vec(),
            Err(e) => return failing(e),
        };
        let gen = gen.clone();
        Box::new((1..=gen.depth()).flat_map(move |e| {
            let floor = params.iter().map(|p| gen.count_slots(p, e - 1)).collect();
            let layer = gen.at(e);
            let sources = params.iter().map(|p| layer.slots(p)).collect();
            Tuples::new(sources)
                .outside(floor)
                .map(|items| items.into_iter().collect::<EngineResult<Vec<_>>>().map(Value::Tuple))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(ty: &str, depth: usize) -> Vec<String> {
        let registry = Registry::with_defaults();
        registry
            .values(ty, depth)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_leaves() {
        assert_eq!(values("int", 2), ["0", "-1", "1", "-2", "2"]);
        assert_eq!(values("nat", 3), ["0", "1", "2"]);
        assert_eq!(values("bool", 1), ["false", "true"]);
        assert_eq!(values("char", 2), ["'a'", "'b'"]);
        assert_eq!(values("word2", 9).len(), 4);
        assert_eq!(values("word8", 9).len(), 9);
    }

    #[test]
    fn test_lists() {
        assert_eq!(values("List[int]", 1), ["[]"]);
        assert_eq!(values("List[int]", 2), ["[]", "[0]", "[-1]", "[1]", "[-2]", "[2]"]);
        assert_eq!(
            values("List[bool]", 3),
            ["[]", "[false]", "[true]", "[false, false]", "[true, false]", "[false, true]", "[true, true]"]
        );
        assert_eq!(
            values("List[List[int]]", 2),
            ["[]", "[[]]", "[[0]]", "[[-1]]", "[[1]]", "[[-2]]", "[[2]]"]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(values("str", 2), ["\"\"", "\"a\"", "\"b\""]);
        assert_eq!(values("str", 3).len(), 10);
    }

    #[test]
    fn test_options_and_tuples() {
        assert_eq!(values("Option[bool]", 1), ["None"]);
        assert_eq!(values("Option[bool]", 2), ["None", "Some(false)", "Some(true)"]);
        assert_eq!(
            values("Tuple[nat, bool]", 2),
            ["(0, false)", "(0, true)", "(1, false)", "(1, true)"]
        );
    }

    #[test]
    fn test_every_default_is_layered() {
        let registry = Registry::with_defaults();
        for ty in ["int", "nat", "word4", "str", "List[bool]", "Option[List[int]]", "Tuple[int, List[bool]]"] {
            for depth in 1..4 {
                let shallow = registry.values(ty, depth).unwrap();
                let deep = registry.values(ty, depth + 1).unwrap();
                assert_eq!(&deep[..shallow.len()], &shallow[..], "{} at {}", ty, depth);
                let mut unique = deep.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), deep.len(), "{} repeats at {}", ty, depth + 1);
            }
        }
    }

    #[test]
    fn test_constructor_without_parameters() {
        let registry = Registry::with_defaults();
        match registry.values("List", 2) {
            Err(EngineError::Generation { ty, .. }) => assert_eq!(ty, "List"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
