//! Contig-end bridging graph.
//!
//! Every bridge links one end of a contig to one end of another. Evidence for the same
//! pair of ends is pooled; consolidation joins the best supported pairs greedily, using
//! each contig end at most once, and reads the resulting chains off as scaffolds. A
//! chain that closes onto itself is a circular scaffold.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use noodles::fasta;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::contig::{n50, Contig};
use crate::core::types::{AlignmentRecord, ReadBatch};
use crate::model::{ScaffoldModel, UsabilityRule};
use crate::utils::sequence::reverse_complement;

/// Tunables of [`ContigGraph`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Minimum number of contig bases an alignment must cover to be usable
    pub min_aligned_length: u64,

    /// How close to a contig end an alignment must reach to be usable
    pub end_margin: u64,

    /// Rewrite the sequence file on every cycle instead of once at the end
    pub update_in_place: bool,

    /// Skip scaffolds shorter than `min_output_length` when writing sequences
    pub trim: bool,

    pub min_output_length: u64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            min_aligned_length: 300,
            end_margin: 1000,
            update_in_place: false,
            trim: false,
            min_output_length: 1000,
        }
    }
}

/// One of the two ends of a contig, in forward orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum End {
    Head,
    Tail,
}

impl End {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Head => Self::Tail,
            Self::Tail => Self::Head,
        }
    }
}

type EndId = (usize, End);

fn slot((contig, end): EndId) -> usize {
    contig * 2 + usize::from(end == End::Tail)
}

/// Pooled evidence for one pair of contig ends
#[derive(Debug, Clone, Default)]
struct PairEvidence {
    reads: u32,
    gap_total: i64,
    /// Read bases spanning the gap, oriented leaving the recorded end
    filler: Option<(EndId, Vec<u8>)>,
}

impl PairEvidence {
    fn mean_gap(&self) -> i64 {
        if self.reads == 0 {
            0
        } else {
            self.gap_total / i64::from(self.reads)
        }
    }
}

/// A contig placed in a scaffold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub contig: usize,
    pub reversed: bool,
    /// Estimated distance from the previous contig, negative for overlaps
    pub gap_before: i64,
}

impl Placement {
    fn entry(&self) -> EndId {
        (self.contig, if self.reversed { End::Tail } else { End::Head })
    }

    fn exit(&self) -> EndId {
        (self.contig, if self.reversed { End::Head } else { End::Tail })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scaffold {
    pub placements: Vec<Placement>,
    pub circular: bool,
}

/// Usable alignments cover enough of a contig and reach close to one of its ends
#[derive(Debug, Clone)]
pub struct ContigEndRule {
    lengths: Vec<u64>,
    min_aligned_length: u64,
    end_margin: u64,
}

impl UsabilityRule for ContigEndRule {
    fn is_usable(&self, record: &AlignmentRecord) -> bool {
        if record.unmapped {
            return false;
        }
        let Some(length) = record.contig.and_then(|idx| self.lengths.get(idx).copied()) else {
            return false;
        };
        if record.aligned_length() < self.min_aligned_length.min(length) {
            return false;
        }
        record.ref_start.saturating_sub(1) <= self.end_margin
            || length.saturating_sub(record.ref_end) <= self.end_margin
    }
}

pub struct ContigGraph {
    contigs: Vec<Contig>,
    options: GraphOptions,
    rule: Arc<ContigEndRule>,
    evidence: BTreeMap<(EndId, EndId), PairEvidence>,
    min_coverage: f64,
    scaffolds: Vec<Scaffold>,
    scaffold_lengths: Vec<u64>,
    bridges_seen: u64,
    sequence_output: Option<PathBuf>,
}

impl ContigGraph {
    #[must_use]
    pub fn new(contigs: Vec<Contig>, options: GraphOptions) -> Self {
        let rule = Arc::new(ContigEndRule {
            lengths: contigs.iter().map(|c| c.length).collect(),
            min_aligned_length: options.min_aligned_length,
            end_margin: options.end_margin,
        });

        let mut graph = Self {
            contigs,
            options,
            rule,
            evidence: BTreeMap::new(),
            min_coverage: 1.0,
            scaffolds: Vec::new(),
            scaffold_lengths: Vec::new(),
            bridges_seen: 0,
            sequence_output: None,
        };
        graph.rebuild_scaffolds();
        graph
    }

    /// Write scaffold sequences as FASTA to `path`
    #[must_use]
    pub fn with_sequence_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.sequence_output = Some(path.into());
        self
    }

    #[must_use]
    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    #[must_use]
    pub fn scaffolds(&self) -> &[Scaffold] {
        &self.scaffolds
    }

    /// Number of bridges accepted so far
    #[must_use]
    pub fn bridges_seen(&self) -> u64 {
        self.bridges_seen
    }

    fn overhang(&self, (contig, end): EndId, record: &AlignmentRecord) -> u64 {
        match end {
            End::Head => record.ref_start.saturating_sub(1),
            End::Tail => self.contigs[contig].tail_after(record.ref_end),
        }
    }

    fn rebuild_scaffolds(&mut self) {
        let n = self.contigs.len();
        let mut links: Vec<Option<(EndId, i64)>> = vec![None; n * 2];

        let mut candidates: Vec<(&(EndId, EndId), &PairEvidence)> = self
            .evidence
            .iter()
            .filter(|(_, ev)| f64::from(ev.reads) >= self.min_coverage)
            .collect();
        // Stable sort keeps key order among equally supported pairs
        candidates.sort_by(|a, b| b.1.reads.cmp(&a.1.reads));

        for (&(x, y), ev) in candidates {
            if links[slot(x)].is_none() && links[slot(y)].is_none() {
                let gap = ev.mean_gap();
                links[slot(x)] = Some((y, gap));
                links[slot(y)] = Some((x, gap));
            }
        }

        let mut visited = vec![false; n];
        let mut scaffolds = Vec::new();

        // Linear chains, entered through a free end
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let entry = if links[slot((start, End::Head))].is_none() {
                End::Head
            } else if links[slot((start, End::Tail))].is_none() {
                End::Tail
            } else {
                continue;
            };
            scaffolds.push(walk(start, entry, &links, &mut visited));
        }

        // Whatever is left lies on a cycle
        for start in 0..n {
            if !visited[start] {
                scaffolds.push(walk(start, End::Head, &links, &mut visited));
            }
        }

        self.scaffold_lengths = scaffolds.iter().map(|s| self.scaffold_length(s)).collect();
        self.scaffolds = scaffolds;
    }

    fn scaffold_length(&self, scaffold: &Scaffold) -> u64 {
        scaffold
            .placements
            .iter()
            .map(|p| {
                let length = self.contigs[p.contig].length;
                let gap = p.gap_before.unsigned_abs();
                if p.gap_before >= 0 {
                    length + gap
                } else {
                    length - gap.min(length)
                }
            })
            .sum()
    }

    fn filler_between(&self, from: EndId, to: EndId) -> Option<Vec<u8>> {
        let key = if from <= to { (from, to) } else { (to, from) };
        let (origin, bases) = self.evidence.get(&key)?.filler.as_ref()?;
        if *origin == from {
            Some(bases.clone())
        } else {
            Some(reverse_complement(bases))
        }
    }

    fn scaffold_sequence(&self, scaffold: &Scaffold) -> Vec<u8> {
        let mut sequence = Vec::new();
        let mut previous: Option<&Placement> = None;

        for placement in &scaffold.placements {
            let contig = &self.contigs[placement.contig];
            let mut bases = if placement.reversed {
                reverse_complement(&contig.sequence)
            } else {
                contig.sequence.clone()
            };

            if let Some(prev) = previous {
                if placement.gap_before > 0 {
                    // Read bases only when they span exactly the estimated gap
                    let gap = placement.gap_before.unsigned_abs() as usize;
                    let filler = self
                        .filler_between(prev.exit(), placement.entry())
                        .filter(|bases| bases.len() == gap)
                        .unwrap_or_else(|| vec![b'N'; gap]);
                    sequence.extend_from_slice(&filler);
                } else if placement.gap_before < 0 {
                    let overlap = (placement.gap_before.unsigned_abs() as usize).min(bases.len());
                    bases.drain(..overlap);
                }
            }

            sequence.extend_from_slice(&bases);
            previous = Some(placement);
        }

        sequence
    }
}

fn walk(
    start: usize,
    entry: End,
    links: &[Option<(EndId, i64)>],
    visited: &mut [bool],
) -> Scaffold {
    let mut placements = Vec::new();
    let mut circular = false;
    let mut current = (start, entry);
    let mut gap = 0;

    loop {
        let (contig, end_in) = current;
        visited[contig] = true;
        placements.push(Placement {
            contig,
            reversed: end_in == End::Tail,
            gap_before: gap,
        });

        match links[slot((contig, end_in.opposite()))] {
            Some(((next, _), _)) if next == start => {
                circular = true;
                break;
            }
            Some(((next, _), _)) if visited[next] => break,
            Some((next_end, next_gap)) => {
                current = next_end;
                gap = next_gap;
            }
            None => break,
        }
    }

    Scaffold {
        placements,
        circular,
    }
}

impl ScaffoldModel for ContigGraph {
    fn usability_rule(&self) -> Arc<dyn UsabilityRule> {
        self.rule.clone()
    }

    fn add_bridge(
        &mut self,
        read: &ReadBatch,
        a: &AlignmentRecord,
        b: &AlignmentRecord,
        min_coverage: f64,
    ) {
        self.min_coverage = min_coverage;

        let (first, second) = if a.read_start <= b.read_start {
            (a, b)
        } else {
            (b, a)
        };
        let (Some(c1), Some(c2)) = (first.contig, second.contig) else {
            return;
        };
        if c1 == c2 || c1 >= self.contigs.len() || c2 >= self.contigs.len() {
            return;
        }

        // Walking along the read we leave the first contig and enter the second
        let exit = (c1, if first.strand.is_reverse() { End::Head } else { End::Tail });
        let entry = (c2, if second.strand.is_reverse() { End::Tail } else { End::Head });

        let exit_overhang = self.overhang(exit, first);
        let entry_overhang = self.overhang(entry, second);
        let read_gap = i64::try_from(second.read_start).unwrap_or(i64::MAX)
            - i64::try_from(first.read_end).unwrap_or(i64::MAX);
        let gap = read_gap - i64::try_from(exit_overhang + entry_overhang).unwrap_or(i64::MAX);

        let key = if exit <= entry { (exit, entry) } else { (entry, exit) };
        let evidence = self.evidence.entry(key).or_default();
        evidence.reads += 1;
        evidence.gap_total += gap;

        // Filler starts and ends at the contig ends, not at the alignment ends
        if evidence.filler.is_none() && gap > 0 {
            let start = usize::try_from(first.read_end + exit_overhang).unwrap_or(usize::MAX);
            let end = usize::try_from(second.read_start.saturating_sub(entry_overhang))
                .unwrap_or(usize::MAX);
            if let Some(bases) = read.sequence.get(start..end) {
                evidence.filler = Some((exit, bases.to_vec()));
            }
        }

        self.bridges_seen += 1;
    }

    fn connect_bridges(&mut self) {
        self.rebuild_scaffolds();
    }

    fn print_sequences(&mut self, update_in_place: bool, final_flag: bool) -> io::Result<()> {
        if !(update_in_place || final_flag) {
            return Ok(());
        }
        let Some(path) = &self.sequence_output else {
            return Ok(());
        };

        let mut out = BufWriter::new(File::create(path)?);
        let mut writer = fasta::io::Writer::new(&mut out);
        let mut written = 0;

        for (idx, scaffold) in self.scaffolds.iter().enumerate() {
            let sequence = self.scaffold_sequence(scaffold);
            if self.options.trim && (sequence.len() as u64) < self.options.min_output_length {
                continue;
            }

            let description = format!(
                "length={} contigs={} circular={}",
                sequence.len(),
                scaffold.placements.len(),
                scaffold.circular
            );
            let record = fasta::Record::new(
                fasta::record::Definition::new(format!("scaffold{}", idx + 1), Some(description.into())),
                fasta::record::Sequence::from(sequence),
            );
            writer.write_record(&record)?;
            written += 1;
        }

        drop(writer);
        out.flush()?;
        debug!(path = %path.display(), scaffolds = written, final_flag, "Wrote scaffold sequences");
        Ok(())
    }

    fn number_of_contigs(&self) -> usize {
        self.scaffolds.len()
    }

    fn number_of_circulars(&self) -> usize {
        self.scaffolds.iter().filter(|s| s.circular).count()
    }

    fn n50(&self) -> u64 {
        n50(&self.scaffold_lengths)
    }

    fn gaps_info(&self) -> String {
        let gaps: Vec<u64> = self
            .scaffolds
            .iter()
            .flat_map(|s| s.placements.iter().skip(1))
            .filter(|p| p.gap_before > 0)
            .map(|p| p.gap_before.unsigned_abs())
            .collect();
        format!("{} ({})", gaps.len(), gaps.iter().max().copied().unwrap_or(0))
    }

    fn print_rt(&mut self, base_count: u64) {
        debug!(
            bases = base_count,
            assembled = self.scaffold_lengths.iter().sum::<u64>(),
            bridges = self.bridges_seen,
            "Real-time progress"
        );
    }

    fn updates_in_place(&self) -> bool {
        self.options.update_in_place
    }
}
