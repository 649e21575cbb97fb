//! # Astrometry.net index files
//!
//! `solve-field` needs star index files covering the field of view of the camera.
//! Each series is published as one directory per catalogue, e.g. `…/4200/` for 2MASS,
//! holding `index-42NN.fits` files where `NN` selects the skymark scale. Scales 08 to
//! 19 suit imagers with a 5 to 50 degree field of view.
use std::ops::RangeInclusive;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_stream::StreamExt;

use crate::platescale_errors::PlateScaleError;

pub const URL_2MASS: &str = "http://broiler.astrometry.net/~dstn/4200/";
pub const URL_TYCHO: &str = "http://broiler.astrometry.net/~dstn/4100/";

pub const DEFAULT_INDEX_RANGE: RangeInclusive<u32> = 8..=19;

/// Series number of an index directory URL: the first two characters of its last
/// path segment (`…/4200/` → 42).
pub fn series_number(source_url: &str) -> Result<u32, PlateScaleError> {
    let invalid = || PlateScaleError::DownloadError(source_url.into(), "not an index series URL".into());
    let segment = source_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| s.len() >= 2)
        .ok_or_else(invalid)?;
    segment
        .get(..2)
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)
}

pub fn index_file_name(series: u32, scale: u32) -> String {
    format!("index-{series:2}{scale:02}.fits")
}

/// `<cache dir>/platescale_cache/astrometry_index`
pub fn default_index_dir() -> Result<Utf8PathBuf, PlateScaleError> {
    let base = BaseDirs::new()
        .ok_or_else(|| PlateScaleError::Utf8PathError("no home directory".into()))?;
    let cache = Utf8Path::from_path(base.cache_dir())
        .ok_or_else(|| PlateScaleError::Utf8PathError(base.cache_dir().display().to_string()))?;
    Ok(cache.join("platescale_cache").join("astrometry_index"))
}

/// Stream `url` into `path`.
///
/// The body goes to `<path>.part` first so that an interrupted transfer is never
/// mistaken for a complete file.
async fn download_big_file(url: &str, path: &Utf8Path) -> Result<(), PlateScaleError> {
    let fail = |e: reqwest::Error| {
        PlateScaleError::DownloadError(
            url.to_string(),
            format!("Are you connected to the Internet? {e}"),
        )
    };

    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fail)?;

    let partial = Utf8PathBuf::from(format!("{path}.part"));
    let mut file = File::create(&partial).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk.map_err(fail)?).await?;
    }
    file.flush().await?;
    tokio::fs::rename(&partial, path).await?;
    Ok(())
}

/// Download the index files of one series into `odir`.
///
/// Arguments
/// ---------
/// * `odir`: output directory, created if missing.
/// * `source_url`: series directory URL, e.g. [`URL_2MASS`].
/// * `scales`: inclusive range of scale numbers.
///
/// Return
/// ------
/// * The files downloaded by this call. Files already present are skipped.
pub async fn get_index(
    odir: &Utf8Path,
    source_url: &str,
    scales: RangeInclusive<u32>,
) -> Result<Vec<Utf8PathBuf>, PlateScaleError> {
    tokio::fs::create_dir_all(odir).await?;
    let series = series_number(source_url)?;
    let base = if source_url.ends_with('/') {
        source_url.to_string()
    } else {
        format!("{source_url}/")
    };

    let mut downloaded = Vec::new();
    for scale in scales {
        let name = index_file_name(series, scale);
        let local = odir.join(&name);
        if local.is_file() {
            log::info!("skipping {local}");
            continue;
        }
        let url = format!("{base}{name}");
        println!("{url} => {local}");
        download_big_file(&url, &local).await?;
        downloaded.push(local);
    }
    Ok(downloaded)
}

#[cfg(test)]
mod index_download_test {
    use super::*;

    #[test]
    fn test_series_number() {
        assert_eq!(series_number(URL_2MASS), Ok(42));
        assert_eq!(series_number(URL_TYCHO), Ok(41));
        assert_eq!(series_number("http://example.org/5000"), Ok(50));
        assert!(series_number("http://example.org/x/").is_err());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(index_file_name(42, 8), "index-4208.fits");
        assert_eq!(index_file_name(41, 19), "index-4119.fits");
        let names: Vec<_> = DEFAULT_INDEX_RANGE.map(|i| index_file_name(42, i)).collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names.last().map(String::as_str), Some("index-4219.fits"));
    }

    #[test]
    fn test_default_dir() {
        if let Ok(dir) = default_index_dir() {
            assert!(dir.ends_with("platescale_cache/astrometry_index"));
        }
    }

    #[tokio::test]
    async fn test_no_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let odir = Utf8Path::from_path(dir.path()).unwrap();
        for i in 10..=12 {
            std::fs::write(odir.join(index_file_name(42, i)), b"present").unwrap();
        }
        // every file exists: nothing is fetched, so no network is needed
        let got = get_index(odir, "http://127.0.0.1:9/4200/", 10..=12).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_source() {
        let dir = tempfile::tempdir().unwrap();
        let odir = Utf8Path::from_path(dir.path()).unwrap();
        let err = get_index(odir, "http://127.0.0.1:9/4200/", 8..=8).await.unwrap_err();
        assert!(matches!(
            err,
            PlateScaleError::DownloadError(ref url, _) if url == "http://127.0.0.1:9/4200/index-4208.fits"
        ));
        assert!(!odir.join("index-4208.fits").exists());
    }
}
