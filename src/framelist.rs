//! Reading lists of frame indices.
//!
//! A frame list is ASCII text with one zero-based frame index per line. Blank lines and
//! anything after a `#` are ignored. Indices may repeat and need not be ordered.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{Error, Result};

pub fn read_frame_list<P: AsRef<Path>>(path: P) -> Result<Vec<usize>> {
    let file = File::open(path)?;
    parse_frame_list(BufReader::new(file))
}

pub fn parse_frame_list<R: BufRead>(reader: R) -> Result<Vec<usize>> {
    let mut frames = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let content = match line.split_once('#') {
            Some((content, _comment)) => content,
            None => &line,
        }
        .trim();
        if content.is_empty() {
            continue;
        }
        let frame = content.parse().map_err(|source| Error::FrameList {
            line: idx + 1,
            content: content.to_string(),
            source,
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_and_repeats_are_kept() {
        let list = "5\n2\n5\n0\n";
        assert_eq!(parse_frame_list(list.as_bytes()).unwrap(), vec![5, 2, 5, 0]);
    }

    #[test]
    fn blanks_and_comments() {
        let list = "# frames of interest\n  3  \n\n10 # the folded state\n\t7\n";
        assert_eq!(parse_frame_list(list.as_bytes()).unwrap(), vec![3, 10, 7]);
    }

    #[test]
    fn empty() {
        assert!(parse_frame_list("".as_bytes()).unwrap().is_empty());
        assert!(parse_frame_list("\n\n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn malformed() {
        for (list, bad_line) in [("1\n2\nthree\n", 3), ("-4\n", 1), ("1 2\n", 1), ("1.5\n", 1)] {
            match parse_frame_list(list.as_bytes()) {
                Err(Error::FrameList { line, .. }) => assert_eq!(line, bad_line, "{list:?}"),
                other => panic!("expected a frame list error for {list:?}, got {other:?}"),
            }
        }
    }
}
