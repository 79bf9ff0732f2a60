use std::path::Path;
use rustc_hash::FxHashMap;
use log::{debug, warn};

use crate::lib::common::for_each_read_pair;
use crate::lib::error::{FilterError, Result};

/// Number of read-ends which fell onto a restriction fragment,
/// keyed by chromosome and fragment start.
/// Built once over the whole file and not altered afterwards.
#[derive(Debug,Clone,Default,PartialEq,Eq)]
pub struct FragmentCounts {
    counts: FxHashMap<(String, i64), u64>,
}

impl FragmentCounts {
    /// occurrences of a fragment, 0 if it was never seen
    pub fn get(&self, chrom: &str, frag_start: i64) -> u64 {
        // the tuple key needs an owned String for the lookup
        self.counts
            .get(&(chrom.to_string(), frag_start))
            .copied()
            .unwrap_or(0)
    }

    pub fn add(&mut self, chrom: &str, frag_start: i64) {
        *self.counts.entry((chrom.to_string(), frag_start)).or_insert(0) += 1;
    }

    /// number of distinct fragments with at least one read-end
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// all occurrence counts sorted ascending
    pub fn sorted_counts(&self) -> Vec<u64> {
        let mut values: Vec<u64> = self.counts.values().copied().collect();
        values.sort_unstable();
        values
    }
}

/// this function takes the read-pair file and counts for
/// every restriction fragment how many read-ends map onto it.
/// Both ends of a pair contribute, meaning a pair with
/// both ends on the same fragment counts twice for it.
///
/// Unittest: TRUE
///
pub fn count_re_fragments(path: &Path) -> Result<FragmentCounts> {
    let mut frag_count = FragmentCounts::default();
    let pairs = for_each_read_pair(path, |pair| {
        frag_count.add(&pair.end1.chrom, pair.end1.frag_start);
        frag_count.add(&pair.end2.chrom, pair.end2.frag_start);
        Ok(())
    })?;
    debug!("Counted {} distinct fragments from {} read pairs", frag_count.len(), pairs);
    Ok(frag_count)
}

/// Determines the occurrence count above which a fragment is
/// considered over-represented. With a fraction p the cutoff is
/// the count found at index floor((1-p)*n + 0.5) of the ascending
/// sorted counts of the n fragments.
///
/// For p = 0 (or very few fragments) that index lies past the end
/// of the list, in that case the largest count is used which means no
/// fragment is flagged. Without any fragment the cutoff is 0.
///
/// Unittest: TRUE
///
pub fn over_represented_cutoff(
    frag_count: &FragmentCounts,
    over_represented: f64
) -> Result<u64> {
    if !(0.0..1.0).contains(&over_represented) {
        return Err(FilterError::Parameter(format!(
            "over-represented fraction must be within [0,1), got {}",
            over_represented
        )));
    }
    let sorted = frag_count.sorted_counts();
    let num_frags = sorted.len();
    if num_frags == 0 {
        warn!("No restriction fragment was counted, over-representation cutoff set to 0");
        return Ok(0);
    }
    let mut cut_index = ((1.0 - over_represented) * num_frags as f64 + 0.5).floor() as usize;
    if cut_index >= num_frags {
        warn!(
            "Over-represented fraction {} selects no fragment among {}, using the maximum count as cutoff",
            over_represented, num_frags
        );
        cut_index = num_frags - 1;
    }
    let cut = sorted[cut_index];
    debug!("Over-representation cutoff: index {} of {} fragments, count {}", cut_index, num_frags, cut);
    Ok(cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn counts_from(values: &[u64]) -> FragmentCounts {
        let mut counts = FragmentCounts::default();
        for (i, v) in values.iter().enumerate() {
            for _ in 0..*v {
                counts.add("chr1", (i as i64) * 1000);
            }
        }
        counts
    }

    #[test]
    fn count_re_fragments_test0(){
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"r1\tchr1\t120\t0\t36\t100\t400\tchr1\t380\t1\t36\t100\t400\n\
r2\tchr1\t520\t0\t36\t400\t900\tchr2\t380\t1\t36\t100\t400\n").unwrap();
        let counts = count_re_fragments(tmp.path()).unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts.get("chr1", 100), 2);
        assert_eq!(counts.get("chr1", 400), 1);
        assert_eq!(counts.get("chr2", 100), 1);
        assert_eq!(counts.get("chr3", 100), 0);
    }
    #[test]
    fn cutoff_test0(){
        // 10 fragments, p = 0.1 => index floor(9.5) = 9
        let counts = counts_from(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(over_represented_cutoff(&counts, 0.1).unwrap(), 10);
        // p = 0.2 => index floor(8.5) = 8
        assert_eq!(over_represented_cutoff(&counts, 0.2).unwrap(), 9);
        // p = 0.5 => index floor(5.5) = 5
        assert_eq!(over_represented_cutoff(&counts, 0.5).unwrap(), 6);
    }
    #[test]
    fn cutoff_index_past_end(){
        // p = 0 => index n, clamped onto the largest count
        let counts = counts_from(&[3, 1, 2]);
        assert_eq!(over_represented_cutoff(&counts, 0.0).unwrap(), 3);
        // few fragments and the default fraction, index round(2.985) = 3
        assert_eq!(over_represented_cutoff(&counts, 0.005).unwrap(), 3);
    }
    #[test]
    fn cutoff_empty(){
        let counts = FragmentCounts::default();
        assert!(counts.is_empty());
        assert_eq!(over_represented_cutoff(&counts, 0.005).unwrap(), 0);
    }
    #[test]
    fn cutoff_invalid_fraction(){
        let counts = counts_from(&[1, 2]);
        assert!(over_represented_cutoff(&counts, 1.0).is_err());
        assert!(over_represented_cutoff(&counts, -0.1).is_err());
        assert!(over_represented_cutoff(&counts, f64::NAN).is_err());
    }
    #[test]
    fn cutoff_monotonic(){
        let counts = counts_from(&[5, 1, 1, 2, 8, 3, 3, 13, 2, 1, 40, 7, 6, 2, 2, 1, 9]);
        let mut previous = u64::MAX;
        for step in 0..100 {
            let p = step as f64 / 100.0;
            let cut = over_represented_cutoff(&counts, p).unwrap();
            assert!(cut <= previous, "cutoff rose from {} to {} at p={}", previous, cut, p);
            previous = cut;
        }
    }
}
