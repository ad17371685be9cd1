//! Taxonomy tree and lowest-common-ancestor computation, plus the
//! accession-to-taxid mapping readers used when building an annotated
//! database.

use std::io::BufRead;

use rustc_hash::FxHashMap;

use crate::error::SearchError;

/// Node 0 is the root sentinel: `parents[0] == 0`, `heights[0] == 0`,
/// and following `parents` from any node reaches 0 in `heights[n]` steps.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    parents: Vec<u32>,
    heights: Vec<u32>,
}

impl Taxonomy {
    pub fn new(parents: Vec<u32>, heights: Vec<u32>) -> Result<Self, SearchError> {
        if parents.len() != heights.len() {
            return Err(SearchError::Lca(
                "parent and height arrays differ in length".into(),
            ));
        }
        if parents.is_empty() || parents[0] != 0 || heights[0] != 0 {
            return Err(SearchError::Lca("node 0 must be the root sentinel".into()));
        }
        Ok(Self { parents, heights })
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn height(&self, node: u32) -> u32 {
        self.heights[node as usize]
    }

    /// Lowest common ancestor of two nodes.
    ///
    /// Lifts the deeper node to equal height, then walks both towards the
    /// root in lockstep. O(max height); no memoization.
    pub fn lca(&self, mut n1: u32, mut n2: u32) -> Result<u32, SearchError> {
        if n1 == n2 {
            return Ok(n1);
        }
        let max = self.parents.len() as u32;
        if n1 >= max || n2 >= max {
            return Err(SearchError::Lca(format!(
                "node id out of range: {}",
                n1.max(n2)
            )));
        }

        while self.heights[n1 as usize] > self.heights[n2 as usize] {
            n1 = self.parents[n1 as usize];
        }
        while self.heights[n2 as usize] > self.heights[n1 as usize] {
            n2 = self.parents[n2 as usize];
        }

        while n1 != 0 && n2 != 0 {
            if n1 == n2 {
                return Ok(n1);
            }
            n1 = self.parents[n1 as usize];
            n2 = self.parents[n2 as usize];
        }
        Err(SearchError::Lca(
            "one of the paths did not lead to the root".into(),
        ))
    }

    /// LCA over a whole hit set; `None` for an empty set.
    pub fn lca_of_set<I: IntoIterator<Item = u32>>(
        &self,
        nodes: I,
    ) -> Result<Option<u32>, SearchError> {
        let mut acc: Option<u32> = None;
        for n in nodes {
            acc = Some(match acc {
                None => n,
                Some(a) => self.lca(a, n)?,
            });
        }
        Ok(acc)
    }
}

fn parse_taxid(field: &str) -> Result<u32, SearchError> {
    field.trim().parse::<u32>().map_err(|_| {
        SearchError::Parse(format!(
            "expected a taxonomical ID, but got something unreadable: {field:?}"
        ))
    })
}

/// Read an NCBI `accession2taxid` file: a header line, then
/// `acc  acc.ver  taxid  gi` rows. Rows whose accession is not in
/// `acc_to_idx` are skipped; a non-numeric taxid fails the whole ingest.
///
/// `tax_ids[i]` collects the taxids of subject `i`; `present` marks every
/// taxid seen.
pub fn read_mapping_ncbi<R: BufRead>(
    reader: R,
    acc_to_idx: &FxHashMap<String, usize>,
    tax_ids: &mut [Vec<u32>],
    present: &mut Vec<bool>,
) -> Result<(), SearchError> {
    let mut lines = reader.lines();
    // header line
    if lines.next().transpose().map_err(io_parse)?.is_none() {
        return Err(SearchError::Parse("mapping file is empty".into()));
    }

    for line in lines {
        let line = line.map_err(io_parse)?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let acc = match fields.next() {
            Some(a) => a,
            None => continue,
        };
        let Some(&idx) = acc_to_idx.get(acc) else {
            continue;
        };
        let taxid_field = fields.nth(1).ok_or_else(|| {
            SearchError::Parse(format!("truncated accession2taxid row: {line:?}"))
        })?;
        let taxid = parse_taxid(taxid_field)?;
        tax_ids[idx].push(taxid);
        mark_present(present, taxid);
    }
    Ok(())
}

/// Read a UniProt `idmapping` file: `acc  column-name  value` rows,
/// strictly tab-delimited, keeping rows with column-name `NCBI_TaxID`.
pub fn read_mapping_uniprot<R: BufRead>(
    reader: R,
    acc_to_idx: &FxHashMap<String, usize>,
    tax_ids: &mut [Vec<u32>],
    present: &mut Vec<bool>,
) -> Result<(), SearchError> {
    for line in reader.lines() {
        let line = line.map_err(io_parse)?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(acc), Some(column), Some(value)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if column != "NCBI_TaxID" {
            continue;
        }
        let Some(&idx) = acc_to_idx.get(acc) else {
            continue;
        };
        let taxid = parse_taxid(value)?;
        tax_ids[idx].push(taxid);
        mark_present(present, taxid);
    }
    Ok(())
}

fn mark_present(present: &mut Vec<bool>, taxid: u32) {
    let idx = taxid as usize;
    if present.len() <= idx {
        present.resize(idx + 1, false);
    }
    present[idx] = true;
}

fn io_parse(e: std::io::Error) -> SearchError {
    SearchError::Parse(format!("could not read mapping file: {e}"))
}
