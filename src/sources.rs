//! # Source lists
//!
//! `solve-field` writes the catalogue stars it matched into an `.rdls` file: a FITS
//! binary table with `RA`/`DEC` columns (degrees, J2000) and, for some index series,
//! a `MAG` column.
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::constants::Degree;
use crate::fits::FitsFile;
use crate::platescale_errors::PlateScaleError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub ra: Degree,
    pub dec: Degree,
    pub mag: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceList {
    pub path: Utf8PathBuf,
    pub sources: Vec<Source>,
}

/// Read the sources of an `.rdls` file from its first binary table.
///
/// Arguments
/// ---------
/// * `rdls`: path of the source list.
///
/// Return
/// ------
/// * The sources in file order. `mag` is `None` for every source when the table has
///   no `MAG` column.
pub fn read_sources(rdls: &Utf8Path) -> Result<SourceList, PlateScaleError> {
    let file = FitsFile::open(rdls)?;
    let table = file
        .first_bintable()
        .ok_or_else(|| PlateScaleError::InvalidFits(format!("{rdls} has no binary table")))?;

    let ra = table.column("RA")?;
    let dec = table.column("DEC")?;
    let mag = if table.has_column("MAG") {
        table.column("MAG")?.into_iter().map(Some).collect()
    } else {
        vec![None; ra.len()]
    };

    let sources = ra
        .into_iter()
        .zip(dec)
        .zip(mag)
        .map(|((ra, dec), mag)| Source { ra, dec, mag })
        .collect();

    Ok(SourceList {
        path: rdls.to_path_buf(),
        sources,
    })
}

impl SourceList {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn has_magnitudes(&self) -> bool {
        self.sources.iter().any(|s| s.mag.is_some())
    }

    /// Keep the `n` brightest sources, brightest first.
    ///
    /// Without magnitudes there is nothing to rank on and the list is returned as is.
    pub fn brightest(self, n: usize) -> Self {
        if !self.has_magnitudes() {
            return self;
        }
        let sources = self
            .sources
            .into_iter()
            .sorted_by_key(|s| OrderedFloat(s.mag.unwrap_or(f64::INFINITY)))
            .take(n)
            .collect();
        SourceList {
            path: self.path,
            sources,
        }
    }

    /// Write `ra,dec,mag` rows; missing magnitudes are left empty.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), PlateScaleError> {
        let mut writer = csv::Writer::from_path(path)?;
        for source in &self.sources {
            writer.serialize(source)?;
        }
        writer.flush()?;
        Ok(())
    }
}
