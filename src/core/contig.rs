use serde::{Deserialize, Serialize};

/// A single contig of the draft assembly being scaffolded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contig {
    /// Sequence name from the FASTA definition line
    pub name: String,

    /// Sequence length
    pub length: u64,

    /// Contig bases, uppercase
    #[serde(skip)]
    pub sequence: Vec<u8>,
}

impl Contig {
    pub fn new(name: impl Into<String>, sequence: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            length: sequence.len() as u64,
            sequence,
        }
    }

    /// Bases past `pos` (1-based) up to the end of the contig
    #[must_use]
    pub fn tail_after(&self, pos: u64) -> u64 {
        self.length.saturating_sub(pos)
    }
}

/// Compute N50 over a set of sequence lengths.
///
/// Returns the largest length L such that pieces of length >= L hold at least half
/// of the total; 0 for an empty set.
#[must_use]
pub fn n50(lengths: &[u64]) -> u64 {
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let total: u64 = sorted.iter().sum();
    let mut running = 0;
    for length in sorted {
        running += length;
        if running * 2 >= total {
            return length;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contig_new() {
        let contig = Contig::new("ctg1", b"ACGTACGT".to_vec());
        assert_eq!(contig.length, 8);
        assert_eq!(contig.tail_after(6), 2);
        assert_eq!(contig.tail_after(20), 0);
    }

    #[test]
    fn test_n50() {
        assert_eq!(n50(&[]), 0);
        assert_eq!(n50(&[100]), 100);
        // total 100, 50 + 30 >= 50
        assert_eq!(n50(&[10, 30, 50, 10]), 50);
        assert_eq!(n50(&[25, 25, 25, 25]), 25);
        assert_eq!(n50(&[2, 3, 4, 5, 6, 7, 8, 9, 10]), 8);
    }
}
