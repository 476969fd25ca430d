//! Spatial clustering of text fragments into rows, cells and records.

use tracing::{debug, trace};

use super::ColumnHistogram;
use crate::models::config::ReconstructConfig;
use crate::models::fragment::TextFragment;
use crate::models::table::Table;

/// Reconstruct a table using the default heuristics.
pub fn reconstruct(fragments: &[TextFragment], page_count: u32) -> Table {
    TableReconstructor::new().reconstruct(fragments, page_count)
}

/// A cell produced by merging adjacent fragments of one row.
#[derive(Debug)]
struct Cell {
    text: String,
    x: f64,
}

/// Rebuilds header and data rows from positioned text.
#[derive(Debug, Clone, Default)]
pub struct TableReconstructor {
    config: ReconstructConfig,
}

impl TableReconstructor {
    /// Create a reconstructor with the default heuristics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom heuristics.
    pub fn with_config(mut self, config: ReconstructConfig) -> Self {
        self.config = config;
        self
    }

    /// Active heuristics.
    pub fn config(&self) -> &ReconstructConfig {
        &self.config
    }

    /// Reconstruct a table from a document's fragments.
    ///
    /// `page_count` only normalizes the optional column histogram. The
    /// function is pure: the same input always yields the same table.
    pub fn reconstruct(&self, fragments: &[TextFragment], page_count: u32) -> Table {
        if fragments.is_empty() {
            return Table::empty();
        }

        let mut sorted: Vec<TextFragment> =
            fragments.iter().cloned().map(TextFragment::rounded).collect();
        sorted.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

        let rows = self.cluster_rows(sorted);
        let cells: Vec<Vec<Cell>> = rows.into_iter().map(|row| self.cluster_cells(row)).collect();

        if self.config.column_histogram {
            let histogram = ColumnHistogram::from_positions(
                cells.iter().flatten().map(|cell| cell.x),
                page_count,
            );
            debug!(
                "Column histogram: {} start positions, boundaries {:?}",
                histogram.len(),
                histogram.boundaries(self.config.column_min_frequency)
            );
        }

        let lines: Vec<Vec<String>> = cells
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.text).collect())
            .collect();

        let Some(header_idx) = self.find_header(&lines) else {
            return Table::new(Vec::new(), Vec::new(), self.config.confidence);
        };

        let mut lines = lines.into_iter().skip(header_idx);
        let headers = lines.next().unwrap_or_default();
        let min_cells = (headers.len() as f64 * self.config.min_row_fill).floor() as usize;

        let rows: Vec<Vec<String>> = lines
            .filter(|line| {
                let keep = line.len() >= min_cells;
                if !keep {
                    trace!("Dropping line with {} cells (< {}): {:?}", line.len(), min_cells, line);
                }
                keep
            })
            .collect();

        debug!(
            "Reconstructed table from {} fragments: header at line {}, {} columns, {} rows",
            fragments.len(),
            header_idx,
            headers.len(),
            rows.len()
        );

        Table::new(headers, rows, self.config.confidence)
    }

    /// Group fragments sorted by `(y, x)` into rows.
    ///
    /// The baseline moves to the first fragment of each new row and is not
    /// averaged over the row's members.
    fn cluster_rows(&self, sorted: Vec<TextFragment>) -> Vec<Vec<TextFragment>> {
        let mut rows = Vec::new();
        let mut current: Vec<TextFragment> = Vec::new();
        let mut last_y: Option<f64> = None;

        for fragment in sorted {
            match last_y {
                Some(y) if (fragment.y - y).abs() <= self.config.row_tolerance => {
                    current.push(fragment);
                }
                _ => {
                    if !current.is_empty() {
                        rows.push(std::mem::take(&mut current));
                    }
                    last_y = Some(fragment.y);
                    current.push(fragment);
                }
            }
        }

        if !current.is_empty() {
            rows.push(current);
        }

        rows
    }

    /// Merge horizontally adjacent fragments of one row into cells.
    fn cluster_cells(&self, mut row: Vec<TextFragment>) -> Vec<Cell> {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));

        let mut cells = Vec::new();
        let mut fragments = row.into_iter();
        let Some(first) = fragments.next() else {
            return cells;
        };

        let mut prev_right = first.right();
        let mut open = Cell {
            x: first.x,
            text: first.text,
        };

        for fragment in fragments {
            let gap = fragment.x - prev_right;
            prev_right = fragment.right();

            if gap < self.config.cell_gap_factor * fragment.height {
                open.text.push(' ');
                open.text.push_str(&fragment.text);
            } else {
                let closed = std::mem::replace(
                    &mut open,
                    Cell {
                        x: fragment.x,
                        text: fragment.text,
                    },
                );
                cells.push(close_cell(closed));
            }
        }

        cells.push(close_cell(open));
        cells
    }

    /// Index of the widest line among the first `header_scan_depth` lines,
    /// keeping the first one on ties.
    fn find_header(&self, lines: &[Vec<String>]) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;

        for (idx, line) in lines.iter().take(self.config.header_scan_depth).enumerate() {
            if best.is_none_or(|(_, count)| line.len() > count) {
                best = Some((idx, line.len()));
            }
        }

        best.map(|(idx, _)| idx)
    }
}

fn close_cell(mut cell: Cell) -> Cell {
    cell.text = cell.text.trim().to_string();
    cell
}
