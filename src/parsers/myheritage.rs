// ==============================================================================
// myheritage.rs - MyHeritage Raw Data Parser
// ==============================================================================
// Description: Parser for MyHeritage quoted CSV raw data downloads
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: '#' comments followed by the FTDNA-style CSV layout
//   # MyHeritage DNA raw data.
//   RSID,CHROMOSOME,POSITION,RESULT
//   "rs4477212","1","82154","AA"
// ==============================================================================

use std::collections::HashSet;

use crate::models::VariantTable;
use crate::parsers::ftdna::parse_result_csv;

pub const SOURCE: &str = "MyHeritage";

pub fn parse(text: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
    parse_result_csv(text, SOURCE, rsids)
}
