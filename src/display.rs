//! # Tabular display
//!
//! Borrowing adaptors that render a [`SourceList`] or a [`PlateScale`] as a
//! [`comfy_table`] table through `{}` formatting.
//!
//! - [`SourcesDisplay`]: `# | RA [deg] | DEC [deg] | RA [hms] | DEC [dms] | MAG`
//! - [`ScaleSummary`]: one row per image corner and the centre pixel, with
//!   `x | y | RA | DEC` and `Azimuth | Elevation` when the scale has them.
//!
//! ```rust,ignore
//! use platescale::display::SourcesDisplay;
//!
//! println!("{}", SourcesDisplay::new(&sources).with_seconds_precision(3));
//! ```
use std::fmt;

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Row, Table};

use crate::conversion::{dec_to_dms, ra_to_hms};
use crate::platescale::PlateScale;
use crate::sources::SourceList;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub struct SourcesDisplay<'a> {
    sources: &'a SourceList,
    seconds_precision: usize,
}

impl<'a> SourcesDisplay<'a> {
    pub fn new(sources: &'a SourceList) -> Self {
        SourcesDisplay {
            sources,
            seconds_precision: 2,
        }
    }

    /// Fractional digits of the sexagesimal seconds.
    pub fn with_seconds_precision(mut self, precision: usize) -> Self {
        self.seconds_precision = precision;
        self
    }

    pub fn table(&self) -> Table {
        let mut table = new_table();
        table.set_header(vec![
            Cell::new("#"),
            Cell::new("RA [deg]"),
            Cell::new("DEC [deg]"),
            Cell::new("RA [hms]"),
            Cell::new("DEC [dms]"),
            Cell::new("MAG"),
        ]);

        for (i, s) in self.sources.sources.iter().enumerate() {
            table.add_row(Row::from(vec![
                right(i.to_string()),
                right(format!("{:.6}", s.ra)),
                right(format!("{:.6}", s.dec)),
                right(ra_to_hms(s.ra, self.seconds_precision)),
                right(dec_to_dms(s.dec, self.seconds_precision)),
                right(s.mag.map_or_else(|| "-".to_string(), |m| format!("{m:.2}"))),
            ]));
        }
        table
    }
}

impl fmt::Display for SourcesDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// Corners and centre of a scale.
pub struct ScaleSummary<'a> {
    scale: &'a PlateScale,
}

impl<'a> ScaleSummary<'a> {
    pub fn new(scale: &'a PlateScale) -> Self {
        ScaleSummary { scale }
    }

    /// `(label, row, col)` of the sampled pixels.
    fn samples(&self) -> Vec<(&'static str, usize, usize)> {
        let (ny, nx) = self.scale.shape();
        let (last_y, last_x) = (ny.saturating_sub(1), nx.saturating_sub(1));
        vec![
            ("upper left", 0, 0),
            ("upper right", 0, last_x),
            ("centre", ny / 2, nx / 2),
            ("lower left", last_y, 0),
            ("lower right", last_y, last_x),
        ]
    }

    pub fn table(&self) -> Table {
        let mut table = new_table();
        let horizontal = self.scale.horizontal.as_ref();

        let mut header = vec![
            Cell::new("pixel"),
            Cell::new("x"),
            Cell::new("y"),
            Cell::new("RA [deg]"),
            Cell::new("DEC [deg]"),
        ];
        if horizontal.is_some() {
            header.extend([Cell::new("Azimuth [deg]"), Cell::new("Elevation [deg]")]);
        }
        table.set_header(header);

        if self.scale.ra.is_empty() {
            return table;
        }
        for (label, y, x) in self.samples() {
            let mut row = vec![
                Cell::new(label),
                right(x.to_string()),
                right(y.to_string()),
                right(format!("{:.4}", self.scale.ra[[y, x]])),
                right(format!("{:.4}", self.scale.dec[[y, x]])),
            ];
            if let Some(h) = horizontal {
                row.push(right(format!("{:.4}", h.azimuth[[y, x]])));
                row.push(right(format!("{:.4}", h.elevation[[y, x]])));
            }
            table.add_row(Row::from(row));
        }
        table
    }
}

impl fmt::Display for ScaleSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.scale.filename)?;
        write!(f, "{}", self.table())
    }
}

#[cfg(test)]
mod display_test {
    use super::*;
    use crate::sources::Source;
    use ndarray::array;

    #[test]
    fn test_sources_table() {
        let list = SourceList {
            path: "field.rdls".into(),
            sources: vec![
                Source {
                    ra: 152.35248165,
                    dec: 59.98073175,
                    mag: Some(5.25),
                },
                Source {
                    ra: 0.0,
                    dec: -0.5,
                    mag: None,
                },
            ],
        };
        let text = SourcesDisplay::new(&list).to_string();
        assert!(text.contains("RA [hms]"));
        assert!(text.contains("10 09 24.60"));
        assert!(text.contains("+59 58 50.63"));
        assert!(text.contains("-00 30 00.00"));
        assert!(text.contains("5.25"));
        assert_eq!(SourcesDisplay::new(&list).table().row_iter().count(), 2);
    }

    #[test]
    fn test_scale_summary() {
        let scale = PlateScale::new(
            "sky.fits".into(),
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            array![[10.0, 20.0, 30.0], [40.0, 50.0, 60.0]],
        );
        let summary = ScaleSummary::new(&scale);
        let table = summary.table();
        assert_eq!(table.row_iter().count(), 5);
        let text = summary.to_string();
        assert!(text.starts_with("sky.fits\n"));
        assert!(text.contains("lower right"));
        assert!(text.contains("60.0000"));
        assert!(!text.contains("Azimuth"));
    }
}
