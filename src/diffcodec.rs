//! §4.2 Diff codec. Shallow diff/patch over [`Infoset`] maps, plus the
//! incremental forms used by the history builder (spec §4.4).

use crate::infoset::Infoset;

/// A shallow patch: `modifications` covers additions and mutations,
/// `deletions` lists attributes present in the base but absent from the
/// target. Ordering of `deletions` is unspecified (spec §4.2).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diff {
    pub modifications: Infoset,
    pub deletions: Vec<String>,
}

/// `diff(a, b)`: `modifications = {k: v in b | k not in a or a[k] != v}`,
/// `deletions = {k in a | k not in b}`.
pub fn diff(a: &Infoset, b: &Infoset) -> Diff {
    let modifications = b
        .iter()
        .filter(|&(k, v)| a.get(k) != Some(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let deletions = a.keys().filter(|k| !b.contains_key(*k)).cloned().collect();
    Diff { modifications, deletions }
}

/// Apply `d` to a copy of `base`, returning the patched infoset. This is the
/// out-of-place variant; see [`patch_in_place`] for the caller-owns-the-buffer
/// variant (spec §9 "in-place patching optimization").
pub fn patch(base: &Infoset, d: &Diff) -> Infoset {
    let mut out = base.clone();
    patch_in_place(&mut out, d);
    out
}

/// Apply `d` to `target` in place. Only safe to use when the caller owns
/// `target` and does not need to retain the pre-patch value.
pub fn patch_in_place(target: &mut Infoset, d: &Diff) {
    for (k, v) in &d.modifications {
        target.insert(k.clone(), v.clone());
    }
    for k in &d.deletions {
        target.remove(k);
    }
}

/// `diff_incremental([x1, x2, ..., xn])` returns `(x1, [diff(x1,x2),
/// diff(x2,x3), ...])`. `seq` must be non-empty.
pub fn diff_incremental(seq: &[Infoset]) -> (Infoset, Vec<Diff>) {
    assert!(!seq.is_empty(), "diff_incremental requires a non-empty sequence");
    let base = seq[0].clone();
    let diffs = seq.windows(2).map(|pair| diff(&pair[0], &pair[1])).collect();
    (base, diffs)
}

/// Reconstruct `[x2, x3, ...]` by applying `diffs` cumulatively to `base`.
pub fn patch_incremental(base: &Infoset, diffs: &[Diff]) -> Vec<Infoset> {
    let mut out = Vec::with_capacity(diffs.len());
    let mut current = base.clone();
    for d in diffs {
        patch_in_place(&mut current, d);
        out.push(current.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infoset::AttrValue;

    fn infoset(pairs: &[(&str, AttrValue)]) -> Infoset {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn diff_then_patch_reconstructs_the_target() {
        let a = infoset(&[("x", AttrValue::Int(1)), ("y", AttrValue::Int(2))]);
        let b = infoset(&[("x", AttrValue::Int(9)), ("z", AttrValue::Int(3))]);
        let d = diff(&a, &b);
        assert_eq!(patch(&a, &d), b);
    }

    #[test]
    fn diff_detects_deletions_and_modifications_only() {
        let a = infoset(&[("x", AttrValue::Int(1)), ("keep", AttrValue::Int(7))]);
        let b = infoset(&[("x", AttrValue::Int(1)), ("keep", AttrValue::Int(7))]);
        let d = diff(&a, &b);
        assert!(d.modifications.is_empty());
        assert!(d.deletions.is_empty());
    }

    #[test]
    fn incremental_round_trip_reconstructs_the_full_sequence() {
        let seq = vec![
            infoset(&[("x", AttrValue::Int(1))]),
            infoset(&[("x", AttrValue::Int(2))]),
            infoset(&[("x", AttrValue::Int(3)), ("y", AttrValue::Str("a".into()))]),
        ];
        let (base, diffs) = diff_incremental(&seq);
        let mut reconstructed = vec![base];
        reconstructed.extend(patch_incremental(&seq[0], &diffs));
        assert_eq!(reconstructed, seq);
    }
}
