//! ## Read-pair classification ##
//! --------------------------------
//! Every read pair is checked against two independent sets of criteria:
//!  - duplicates: the combination of both mapped positions was seen before (PCR artifact)
//!  - geometry: only for pairs on a single chromosome, an ordered list of rules where the
//!    first matching one decides the category
//!
//! ```text
//!  self-circle  ----<===---===>---   same fragment, pointing outside
//!  dangling-end ----===>---<===---   same fragment, pointing inside
//!  error        ---===>--===>---     same fragment, same direction
//! ```
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use log::{debug, info};

use crate::lib::common::{for_each_read_pair, ReadPair};
use crate::lib::error::{FilterError, Result};
use crate::lib::fragments::{count_re_fragments, over_represented_cutoff, FragmentCounts};

/// The artifact categories a read pair can be assigned to.
/// Apart from `Duplicated` a pair ends up in at most one of them.
#[derive(Debug,Clone,Copy,Hash,Eq,PartialEq,PartialOrd,Ord)]
pub enum FilterCategory {
    /// same fragment, ends point outward
    SelfCircle,
    /// same fragment, ends point inward
    DanglingEnd,
    /// different but close fragments, ends point inward
    ExtraDanglingEnd,
    /// same fragment, same orientation
    Error,
    /// same combination of positions seen more than once
    Duplicated,
    /// an end lies next to a restriction site
    TooCloseFromRe,
    /// a fragment is below the minimum size
    TooShort,
    /// a fragment is above the maximum size
    TooLarge,
    /// a fragment is hit by too many reads
    OverRepresented,
}

impl FilterCategory {
    /// all categories in reporting order
    pub const ALL: [FilterCategory; 9] = [
        FilterCategory::SelfCircle,
        FilterCategory::DanglingEnd,
        FilterCategory::ExtraDanglingEnd,
        FilterCategory::Error,
        FilterCategory::Duplicated,
        FilterCategory::TooCloseFromRe,
        FilterCategory::TooShort,
        FilterCategory::TooLarge,
        FilterCategory::OverRepresented,
    ];

    /// the numeric identifier, 1 to 9
    pub fn id(self) -> u8 {
        match self {
            FilterCategory::SelfCircle       => 1,
            FilterCategory::DanglingEnd      => 2,
            FilterCategory::ExtraDanglingEnd => 3,
            FilterCategory::Error            => 4,
            FilterCategory::Duplicated       => 5,
            FilterCategory::TooCloseFromRe   => 6,
            FilterCategory::TooShort         => 7,
            FilterCategory::TooLarge         => 8,
            FilterCategory::OverRepresented  => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterCategory::SelfCircle       => "self-circle",
            FilterCategory::DanglingEnd      => "dangling-end",
            FilterCategory::ExtraDanglingEnd => "extra dangling-end",
            FilterCategory::Error            => "error",
            FilterCategory::Duplicated       => "duplicated",
            FilterCategory::TooCloseFromRe   => "too close from RE",
            FilterCategory::TooShort         => "too short",
            FilterCategory::TooLarge         => "too large",
            FilterCategory::OverRepresented  => "over-represented",
        }
    }

    pub fn from_id(id: u8) -> Option<FilterCategory> {
        FilterCategory::ALL.iter().copied().find(|c| c.id() == id)
    }

    fn index(self) -> usize {
        usize::from(self.id() - 1)
    }
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// accepts either the numeric id or the name of a category
impl FromStr for FilterCategory {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let found = match s.parse::<u8>() {
            Ok(id) => FilterCategory::from_id(id),
            Err(_) => FilterCategory::ALL
                .iter()
                .copied()
                .find(|c| c.name().eq_ignore_ascii_case(s)),
        };
        found.ok_or_else(|| FilterError::Parameter(format!("unknown filter category {:?}", s)))
    }
}

/// parses a comma separated list of category ids or names
///
/// Unittest: TRUE
///
pub fn parse_categories(list: &str) -> Result<Vec<FilterCategory>> {
    let mut categories = Vec::new();
    for entry in list.split(',').filter(|e| !e.trim().is_empty()) {
        let category = entry.parse::<FilterCategory>()?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    Ok(categories)
}

/// The read ids flagged for every category. Sets keep the order
/// in which ids were flagged so that written tables are reproducible.
#[derive(Debug,Clone,Default,PartialEq,Eq)]
pub struct FilterMasks {
    reads: [IndexSet<String>; 9],
}

impl FilterMasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// returns false if the id was already flagged for that category
    pub fn insert(&mut self, category: FilterCategory, read_id: &str) -> bool {
        let set = &mut self.reads[category.index()];
        if set.contains(read_id) {
            return false;
        }
        set.insert(read_id.to_string())
    }

    pub fn contains(&self, category: FilterCategory, read_id: &str) -> bool {
        self.reads[category.index()].contains(read_id)
    }

    pub fn get(&self, category: FilterCategory) -> &IndexSet<String> {
        &self.reads[category.index()]
    }

    pub fn len(&self, category: FilterCategory) -> usize {
        self.reads[category.index()].len()
    }

    /// categories with their read ids in id order
    pub fn iter(&self) -> impl Iterator<Item = (FilterCategory, &IndexSet<String>)> + '_ {
        let all: &'static [FilterCategory; 9] = &FilterCategory::ALL;
        all.iter().map(move |c| (*c, self.get(*c)))
    }

    /// all read ids flagged by at least one of the chosen categories,
    /// None selects all of them
    pub fn masked_reads(&self, categories: Option<&[FilterCategory]>) -> FxHashSet<&str> {
        let chosen: &[FilterCategory] = categories.unwrap_or(&FilterCategory::ALL);
        let mut masked: FxHashSet<&str> = FxHashSet::default();
        for category in chosen {
            masked.extend(self.get(*category).iter().map(|id| id.as_str()));
        }
        masked
    }

    /// one line per category, "1- self-circle   : 12"
    pub fn summary(&self) -> Vec<String> {
        self.iter()
            .map(|(c, reads)| format!("{}- {:<25} : {}", c.id(), c.name(), reads.len()))
            .collect()
    }
}

/// All parameters of the classification.
/// Distances and sizes are in base pairs.
#[derive(Debug,Clone,PartialEq)]
pub struct FilterParams {
    /// pairs on different fragments closer than this and facing
    /// each other are extra dangling-ends
    pub max_molecule_length: i64,
    /// fraction of the most frequently hit fragments to flag
    pub over_represented: f64,
    pub max_frag_size: i64,
    pub min_frag_size: i64,
    /// minimum distance of an end to its fragment boundaries
    pub re_proximity: i64,
    /// print the number of flagged reads per category
    pub verbose: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams {
            max_molecule_length: 500,
            over_represented   : 0.005,
            max_frag_size      : 100_000,
            min_frag_size      : 100,
            re_proximity       : 5,
            verbose            : true,
        }
    }
}

impl FilterParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.over_represented) {
            return Err(FilterError::Parameter(format!(
                "over-represented fraction must be within [0,1), got {}",
                self.over_represented
            )));
        }
        let sizes = [
            ("max_molecule_length", self.max_molecule_length),
            ("max_frag_size", self.max_frag_size),
            ("min_frag_size", self.min_frag_size),
            ("re_proximity", self.re_proximity),
        ];
        for (name, value) in sizes.iter() {
            if *value < 0 {
                return Err(FilterError::Parameter(format!("{} must not be negative, got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// what the geometry rules need besides the pair itself
struct RuleContext<'a> {
    params: &'a FilterParams,
    frag_count: &'a FragmentCounts,
    cut: u64,
}

/// a single rule of the geometry chain
struct GeometryRule {
    label: &'static str,
    test: fn(&ReadPair, &RuleContext) -> Option<FilterCategory>,
}

/// evaluated in this order, the first match decides
const GEOMETRY_RULES: [GeometryRule; 6] = [
    GeometryRule { label: "same fragment",        test: same_fragment },
    GeometryRule { label: "close and facing",     test: close_and_facing },
    GeometryRule { label: "restriction site",     test: close_to_restriction_site },
    GeometryRule { label: "fragment too short",   test: fragment_too_short },
    GeometryRule { label: "fragment too large",   test: fragment_too_large },
    GeometryRule { label: "over-represented",     test: fragment_over_represented },
];

/// ends with opposite orientation pointing away from each other
fn points_outward(pair: &ReadPair) -> bool {
    (pair.end2.pos > pair.end1.pos) == pair.end2.forward
}

fn same_fragment(pair: &ReadPair, _ctx: &RuleContext) -> Option<FilterCategory> {
    // fragment ends are the identity of a fragment
    if pair.end1.frag_end != pair.end2.frag_end {
        return None;
    }
    if pair.end1.forward == pair.end2.forward {
        // ---===>--===>--- or ---<===--<===---
        Some(FilterCategory::Error)
    } else if points_outward(pair) {
        // ----<===---===>---
        Some(FilterCategory::SelfCircle)
    } else {
        // ----===>---<===---
        Some(FilterCategory::DanglingEnd)
    }
}

fn close_and_facing(pair: &ReadPair, ctx: &RuleContext) -> Option<FilterCategory> {
    let (e1, e2) = (&pair.end1, &pair.end2);
    if e1.pos.abs_diff(e2.pos) < ctx.params.max_molecule_length as u64
        && e1.pos != e2.pos
        && e1.forward != e2.forward
        && !points_outward(pair)
    {
        Some(FilterCategory::ExtraDanglingEnd)
    } else {
        None
    }
}

fn close_to_restriction_site(pair: &ReadPair, ctx: &RuleContext) -> Option<FilterCategory> {
    // validated to be non-negative
    let limit = ctx.params.re_proximity as u64;
    let too_close = [&pair.end1, &pair.end2].iter().any(|e| {
        e.frag_end.abs_diff(e.pos) < limit || e.frag_start.abs_diff(e.pos) < limit
    });
    if too_close { Some(FilterCategory::TooCloseFromRe) } else { None }
}

fn fragment_too_short(pair: &ReadPair, ctx: &RuleContext) -> Option<FilterCategory> {
    let min = ctx.params.min_frag_size;
    if pair.end1.frag_length() < min || pair.end2.frag_length() < min {
        Some(FilterCategory::TooShort)
    } else {
        None
    }
}

fn fragment_too_large(pair: &ReadPair, ctx: &RuleContext) -> Option<FilterCategory> {
    let max = ctx.params.max_frag_size;
    if pair.end1.frag_length() > max || pair.end2.frag_length() > max {
        Some(FilterCategory::TooLarge)
    } else {
        None
    }
}

fn fragment_over_represented(pair: &ReadPair, ctx: &RuleContext) -> Option<FilterCategory> {
    if ctx.frag_count.get(&pair.end1.chrom, pair.end1.frag_start) > ctx.cut
        || ctx.frag_count.get(&pair.end2.chrom, pair.end2.frag_start) > ctx.cut
    {
        Some(FilterCategory::OverRepresented)
    } else {
        None
    }
}

/// the two (chromosome, position) pairs of a read pair, sorted
type PositionKey = ((String, i64), (String, i64));

fn position_key(pair: &ReadPair) -> PositionKey {
    let a = (pair.end1.chrom.clone(), pair.end1.pos);
    let b = (pair.end2.chrom.clone(), pair.end2.pos);
    if a <= b { (a, b) } else { (b, a) }
}

/// Streaming classifier, one call of `classify` per read pair.
/// The fragment counts and the cutoff have to be determined
/// beforehand over the complete file.
pub struct Classifier<'a> {
    params: &'a FilterParams,
    frag_count: &'a FragmentCounts,
    cut: u64,
    first_seen: FxHashMap<PositionKey, String>,
    masks: FilterMasks,
}

impl<'a> Classifier<'a> {
    pub fn new(params: &'a FilterParams, frag_count: &'a FragmentCounts, cut: u64) -> Self {
        Classifier {
            params,
            frag_count,
            cut,
            first_seen: FxHashMap::default(),
            masks: FilterMasks::new(),
        }
    }

    /// flags the pair (and for duplicates the first pair with the
    /// same positions) in the masks. Returns the geometry category
    /// if one matched.
    pub fn classify(&mut self, pair: &ReadPair) -> Option<FilterCategory> {
        self.check_duplicate(pair);
        let category = self.geometry(pair);
        if let Some(c) = category {
            self.masks.insert(c, &pair.id);
        }
        category
    }

    fn check_duplicate(&mut self, pair: &ReadPair) {
        let key = position_key(pair);
        match self.first_seen.get(&key) {
            None => {
                self.first_seen.insert(key, pair.id.clone());
            }
            Some(first) => {
                self.masks.insert(FilterCategory::Duplicated, &pair.id);
                self.masks.insert(FilterCategory::Duplicated, first);
            }
        }
    }

    fn geometry(&self, pair: &ReadPair) -> Option<FilterCategory> {
        if !pair.is_intra_chromosomal() {
            return None;
        }
        let ctx = RuleContext {
            params: self.params,
            frag_count: self.frag_count,
            cut: self.cut,
        };
        for rule in GEOMETRY_RULES.iter() {
            if let Some(category) = (rule.test)(pair, &ctx) {
                debug!("Read {} matched rule '{}': {}", pair.id, rule.label, category);
                return Some(category);
            }
        }
        None
    }

    pub fn masks(&self) -> &FilterMasks {
        &self.masks
    }

    pub fn finish(self) -> FilterMasks {
        self.masks
    }
}

/// Runs the classification pass over a read-pair file with
/// already determined fragment counts.
///
/// Unittest: TRUE
///
pub fn classify_reads(
    path: &Path,
    params: &FilterParams,
    frag_count: &FragmentCounts
) -> Result<FilterMasks> {
    params.validate()?;
    let cut = over_represented_cutoff(frag_count, params.over_represented)?;
    let mut classifier = Classifier::new(params, frag_count, cut);
    let pairs = for_each_read_pair(path, |pair| {
        classifier.classify(&pair);
        Ok(())
    })?;
    info!("Classified {} read pairs", pairs);
    let masks = classifier.finish();
    if params.verbose {
        for line in masks.summary() {
            eprintln!("INFO: {}", line);
        }
    }
    Ok(masks)
}

/// Apply the different filters on all pairs of reads of a file:
/// first the fragment occurrences are counted over the whole file,
/// then every pair is classified.
///
/// Returns for every category the set of read ids to be removed.
///
/// Unittest: TRUE
///
pub fn filter_reads(path: &Path, params: &FilterParams) -> Result<FilterMasks> {
    params.validate()?;
    info!("Counting restriction fragment occurrences in {:?}", path);
    let frag_count = count_re_fragments(path)?;
    classify_reads(path, params, &frag_count)
}
