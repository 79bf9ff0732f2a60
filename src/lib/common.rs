use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use log::debug;

use crate::lib::error::{FilterError, Result};

/// number of whitespace separated fields a read-pair line
/// needs to have, additional ones are ignored
pub const READ_PAIR_FIELDS: usize = 13;

/// some information about the program run which
/// we add to generated tables to document them
#[derive(Debug,Clone,Copy)]
pub struct VersionInfo <'a>{
    /// the used program/sub-program
    pub program  : &'a str,
    /// the version of the program
    pub version  : &'a str,
    /// the author
    pub author : &'a str,
    /// the executed command
    pub command : &'a str,
}

/// one mate of a read pair as reported by the
/// mapping/fragment intersection step.
/// The strand flag of the file is 1 for forward and 0 for reverse.
#[derive(Debug,Clone,PartialEq,Eq,Default)]
pub struct ReadEnd {
    /// chromosome the end maps to
    pub chrom: String,
    /// mapped position
    pub pos: i64,
    /// orientation, true if the file reported 1
    pub forward: bool,
    /// start of the restriction fragment containing pos
    pub frag_start: i64,
    /// end of the restriction fragment containing pos
    pub frag_end: i64,
}

impl ReadEnd {
    pub fn frag_length(&self) -> i64 {
        self.frag_end - self.frag_start
    }
}

/// A read pair, one per line of the input file.
/// Ids are assumed to be unique within a file.
#[derive(Debug,Clone,PartialEq,Eq,Default)]
pub struct ReadPair {
    pub id: String,
    pub end1: ReadEnd,
    pub end2: ReadEnd,
}

impl ReadPair {
    pub fn is_intra_chromosomal(&self) -> bool {
        self.end1.chrom == self.end2.chrom
    }
}

/// lines which carry no read pair, e.g. the "# CRM" header
/// lines written in front of the read-pair tables
pub fn is_meta_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// coordinates are never negative
fn parse_int(field: &str, what: &str, line_no: usize) -> Result<i64> {
    let value = field.parse::<i64>().map_err(|_| {
        FilterError::parse(line_no, format!("{} {:?} is not an integer", what, field))
    })?;
    if value < 0 {
        return Err(FilterError::parse(line_no, format!("{} {} is negative", what, value)));
    }
    Ok(value)
}

fn parse_end(fields: &[&str], line_no: usize) -> Result<ReadEnd> {
    // chrom pos strand <ignored> frag_start frag_end
    let forward = match fields[2] {
        "1" => true,
        "0" => false,
        other => return Err(FilterError::parse(
            line_no,
            format!("strand {:?} must be 0 or 1", other),
        )),
    };
    Ok(ReadEnd {
        chrom     : fields[0].to_string(),
        pos       : parse_int(fields[1], "position", line_no)?,
        forward,
        frag_start: parse_int(fields[4], "fragment start", line_no)?,
        frag_end  : parse_int(fields[5], "fragment end", line_no)?,
    })
}

/// this function takes a single line of the read-pair file
/// and returns the parsed read pair. The line number is only
/// used to report errors and is 1-based.
///
/// Expected layout, whitespace separated:
/// read_id chrom1 pos1 strand1 _ frag_start1 frag_end1 chrom2 pos2 strand2 _ frag_start2 frag_end2
///
/// Unittest: TRUE
///
pub fn parse_read_pair(line: &str, line_no: usize) -> Result<ReadPair> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < READ_PAIR_FIELDS {
        return Err(FilterError::parse(
            line_no,
            format!("expected at least {} fields, found {}", READ_PAIR_FIELDS, fields.len()),
        ));
    }
    Ok(ReadPair {
        id  : fields[0].to_string(),
        end1: parse_end(&fields[1..7], line_no)?,
        end2: parse_end(&fields[7..13], line_no)?,
    })
}

/// opens a read-pair file for buffered reading
pub fn open_reads(path: &Path) -> Result<BufReader<File>> {
    let input = File::open(path).map_err(|e| FilterError::io(e, path))?;
    Ok(BufReader::new(input))
}

/// Streams over all read pairs of a file and hands them one
/// by one to the provided function. Meta lines are skipped, the
/// first malformed line aborts the whole pass.
/// Returns the number of read pairs visited.
///
/// Unittest: TRUE
///
pub fn for_each_read_pair<F>(path: &Path, mut f: F) -> Result<u64>
where
    F: FnMut(ReadPair) -> Result<()>,
{
    let reader = open_reads(path)?;
    let mut pairs = 0_u64;
    for (idx, line) in reader.lines().enumerate() {
        let l = line.map_err(|e| FilterError::io(e, path))?;
        if is_meta_line(&l) {
            continue;
        }
        f(parse_read_pair(&l, idx + 1)?)?;
        pairs += 1;
    }
    debug!("Visited {} read pairs in {:?}", pairs, path);
    Ok(pairs)
}

/// adapted from here https://users.rust-lang.org/t/efficient-way-of-checking-if-two-files-have-the-same-content/74735
/// very useful for tests with external files and to verify that the results is identical
/// to a previously manually generated result file
pub fn is_same_file(
    file1: &Path,
    file2: &Path
) -> Result<bool> {
    debug!("comparing file1 {:?} and file2 with each other {:?}", file1, file2);
    let f1 = File::open(file1).map_err(|e| FilterError::io(e, file1))?;
    let f2 = File::open(file2).map_err(|e| FilterError::io(e, file2))?;
    if f1.metadata()?.len() != f2.metadata()?.len() {
        return Ok(false);
    }

    // Use buf readers since they are much faster
    let f1r = BufReader::new(f1);
    let f2r = BufReader::new(f2);

    // Do a byte to byte comparison of the two files
    for (b1, b2) in f1r.bytes().zip(f2r.bytes()) {
        if b1? != b2? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parse_read_pair_test0(){
        let line = "r1\tchr1\t120\t0\t36\t100\t400\tchr1\t380\t1\t36\t100\t400\n";
        let result = parse_read_pair(line, 1).unwrap();
        let truth = ReadPair {
            id: String::from("r1"),
            end1: ReadEnd { chrom: String::from("chr1"), pos: 120, forward: false, frag_start: 100, frag_end: 400 },
            end2: ReadEnd { chrom: String::from("chr1"), pos: 380, forward: true, frag_start: 100, frag_end: 400 },
        };
        assert_eq!(result, truth);
        assert!(result.is_intra_chromosomal());
        assert_eq!(result.end1.frag_length(), 300);
    }
    #[test]
    fn parse_read_pair_extra_fields(){
        // additional columns are simply ignored
        let line = "r1 chr1 120 0 36 100 400 chr2 380 1 36 100 400 extra";
        let result = parse_read_pair(line, 1).unwrap();
        assert_eq!(result.end2.chrom, "chr2");
        assert!(!result.is_intra_chromosomal());
    }
    #[test]
    fn parse_read_pair_too_few_fields(){
        let line = "r1\tchr1\t120\t0\t36\t100\t400\tchr1\t380\t1\t36\t100";
        match parse_read_pair(line, 7) {
            Err(FilterError::Parse { line, .. }) => assert_eq!(line, 7),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
    #[test]
    fn parse_read_pair_bad_integer(){
        let line = "r1\tchr1\tabc\t0\t36\t100\t400\tchr1\t380\t1\t36\t100\t400";
        assert!(parse_read_pair(line, 1).is_err());
    }
    #[test]
    fn parse_read_pair_negative_position(){
        let line = "r1\tchr1\t-120\t0\t36\t100\t400\tchr1\t380\t1\t36\t100\t400";
        assert!(matches!(parse_read_pair(line, 3), Err(FilterError::Parse { line: 3, .. })));
        let line = "r1\tchr1\t120\t0\t36\t100\t400\tchr1\t380\t1\t36\t-100\t400";
        assert!(matches!(parse_read_pair(line, 1), Err(FilterError::Parse { .. })));
    }
    #[test]
    fn parse_read_pair_extreme_coordinates(){
        let line = "r1\tchr1\t-9223372036854775808\t0\t36\t100\t400\tchr1\t1000\t1\t36\t900\t1400";
        assert!(matches!(parse_read_pair(line, 1), Err(FilterError::Parse { .. })));
        // beyond i64
        let line = "r1\tchr1\t9223372036854775808\t0\t36\t100\t400\tchr1\t1000\t1\t36\t900\t1400";
        assert!(matches!(parse_read_pair(line, 1), Err(FilterError::Parse { .. })));
        let line = "r1\tchr1\t9223372036854775807\t0\t36\t0\t9223372036854775807\tchr1\t0\t1\t36\t0\t10";
        let result = parse_read_pair(line, 1).unwrap();
        assert_eq!(result.end1.pos, i64::MAX);
    }
    #[test]
    fn parse_read_pair_bad_strand(){
        let line = "r1\tchr1\t120\t-\t36\t100\t400\tchr1\t380\t1\t36\t100\t400";
        assert!(parse_read_pair(line, 1).is_err());
    }
    #[test]
    fn meta_lines(){
        assert!(is_meta_line("# CRM chr1\t1000"));
        assert!(is_meta_line("   \n"));
        assert!(!is_meta_line("r1\tchr1"));
    }
    #[test]
    fn for_each_read_pair_test0(){
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"# CRM chr1\t1000\nr1\tchr1\t120\t0\t36\t100\t400\tchr1\t380\t1\t36\t100\t400\n\nr2\tchr1\t130\t0\t36\t100\t400\tchr2\t380\t1\t36\t100\t400\n").unwrap();
        let mut ids = Vec::new();
        let visited = for_each_read_pair(tmp.path(), |pair| { ids.push(pair.id); Ok(()) }).unwrap();
        assert_eq!(visited, 2);
        assert_eq!(ids, vec![String::from("r1"), String::from("r2")]);
    }
    #[test]
    fn for_each_read_pair_fails_fast(){
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"r1\tchr1\t120\t0\t36\t100\t400\tchr1\t380\t1\t36\t100\t400\nbroken line\n").unwrap();
        let result = for_each_read_pair(tmp.path(), |_| Ok(()));
        match result {
            Err(FilterError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
    #[test]
    fn for_each_read_pair_missing_file(){
        let result = for_each_read_pair(Path::new("/this/file/does/not/exist.tsv"), |_| Ok(()));
        assert!(matches!(result, Err(FilterError::Io { .. })));
    }
    #[test]
    fn same_file_test(){
        let mut tmp1 = NamedTempFile::new().unwrap();
        let mut tmp2 = NamedTempFile::new().unwrap();
        let mut tmp3 = NamedTempFile::new().unwrap();
        tmp1.write_all(b"abc\n").unwrap();
        tmp2.write_all(b"abc\n").unwrap();
        tmp3.write_all(b"abd\n").unwrap();
        assert!(is_same_file(tmp1.path(), tmp2.path()).unwrap());
        assert!(!is_same_file(tmp1.path(), tmp3.path()).unwrap());
    }
}
