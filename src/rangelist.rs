// src/rangelist.rs
//
// =============================================================================
// TOPOLOGY-SCHED: CPUSET-STYLE RANGE LIST PARSER
// =============================================================================
//
// Decodes Linux-style numeric range lists such as "0-3,8,10-12" into a
// sorted, deduplicated sequence of integers. Ported from the original
// `Node.ParseRangeList` static method, which does the same with
// `itertools.chain` over `range()` objects.

use crate::error::RangeParseError;
use std::collections::BTreeSet;

/// Parses a comma-separated list of integers and inclusive ranges
/// (`lo-hi`) into a sorted, deduplicated vector.
///
/// An empty string parses to an empty vector. `lo == hi` is a single-value
/// range; `lo > hi` is an error.
pub fn parse(input: &str) -> Result<Vec<u32>, RangeParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let mut values = BTreeSet::new();
    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(RangeParseError::EmptyToken(input.to_string()));
        }

        match token.split_once('-') {
            Some((lo_s, hi_s)) => {
                let lo = parse_i64(lo_s)?;
                let hi = parse_i64(hi_s)?;
                if lo > hi {
                    return Err(RangeParseError::InvalidRange { lo, hi });
                }
                for v in lo..=hi {
                    values.insert(v as u32);
                }
            }
            None => {
                values.insert(parse_i64(token)? as u32);
            }
        }
    }

    Ok(values.into_iter().collect())
}

fn parse_i64(s: &str) -> Result<i64, RangeParseError> {
    s.parse::<i64>()
        .map_err(|_| RangeParseError::NotANumber(s.to_string()))
}
