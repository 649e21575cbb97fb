//! # Astrometry.net `solve-field` plumbing
//!
//! Locating the executable, running it on an image and finding the WCS solution it
//! leaves next to the input. Blind solving itself is entirely delegated to
//! Astrometry.net.
use std::env;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};

use crate::platescale_errors::PlateScaleError;

/// Executable name searched on `PATH`.
pub const SOLVE_FIELD: &str = "solve-field";

/// Environment variable overriding the executable location.
pub const SOLVE_FIELD_ENV: &str = "SOLVE_FIELD";

/// Last line printed by `solve-field` when no solution was found.
const NOT_SOLVED_MARKER: &str = "Did not solve";

/// Locate `solve-field`.
///
/// Arguments
/// ---------
/// * `explicit`: path from the configuration, tried first.
///
/// Return
/// ------
/// * The executable path: `explicit`, else `$SOLVE_FIELD`, else the first match on
///   `PATH`; [`PlateScaleError::SolverNotFound`] when none exists.
pub fn locate_solver(explicit: Option<&Utf8Path>) -> Result<Utf8PathBuf, PlateScaleError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_owned());
        }
        log::warn!("configured solver {path} does not exist, searching PATH");
    }

    if let Ok(path) = env::var(SOLVE_FIELD_ENV) {
        let path = Utf8PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
    }

    let search = env::var_os("PATH").ok_or(PlateScaleError::SolverNotFound)?;
    env::split_paths(&search)
        .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .map(|dir| dir.join(SOLVE_FIELD))
        .find(|candidate| candidate.is_file())
        .ok_or(PlateScaleError::SolverNotFound)
}

/// Command line for one solve: `[exe, --overwrite, <file>, --verbose, args…]`.
///
/// `args` is split on single spaces; empty pieces are dropped because `solve-field`
/// rejects empty arguments.
pub fn solve_command(exe: &Utf8Path, fits: &Utf8Path, args: &str) -> Vec<String> {
    let mut cmd = vec![
        exe.to_string(),
        "--overwrite".to_string(),
        fits.to_string(),
        "--verbose".to_string(),
    ];
    cmd.extend(args.split(' ').filter(|a| !a.is_empty()).map(str::to_string));
    cmd
}

/// Run `solve-field` on `fits`, streaming its output.
///
/// Return
/// ------
/// * `Ok(())` when the solver finished and reported a solution,
///   [`PlateScaleError::NotSolved`] when its last line says "Did not solve",
///   [`PlateScaleError::SolverFailed`] on a non-zero exit status.
///
/// # See also
/// * [`find_wcs_file`] – the solution written next to the input.
pub fn do_solve(exe: &Utf8Path, fits: &Utf8Path, args: &str) -> Result<(), PlateScaleError> {
    if !fits.is_file() {
        return Err(PlateScaleError::FileNotFound(fits.to_string()));
    }

    let cmd = solve_command(exe, fits, args);
    log::info!("{}", cmd.join(" "));

    let mut child = Command::new(&cmd[0])
        .args(&cmd[1..])
        .stdout(Stdio::piped())
        .spawn()?;

    let mut last_line = String::new();
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            println!("{line}");
            last_line = line;
        }
    }
    let status = child.wait()?;

    if last_line.contains(NOT_SOLVED_MARKER) {
        return Err(PlateScaleError::NotSolved(fits.to_string()));
    }
    if !status.success() {
        return Err(PlateScaleError::SolverFailed(
            fits.to_string(),
            status.to_string(),
        ));
    }
    Ok(())
}

/// Find the WCS solution belonging to `fits`.
///
/// Search order: `fits` itself when it is a `.wcs` file, `<stem>.wcs`, each of
/// `fallbacks`, then `wcs.fits` in the same directory (astrometry.net web service
/// download name).
pub fn find_wcs_file(
    fits: &Utf8Path,
    fallbacks: &[Utf8PathBuf],
) -> Result<Utf8PathBuf, PlateScaleError> {
    if fits.extension() == Some("wcs") && fits.is_file() {
        return Ok(fits.to_owned());
    }

    let candidates = std::iter::once(fits.with_extension("wcs"))
        .chain(fallbacks.iter().cloned())
        .chain(std::iter::once(fits.with_file_name("wcs.fits")));

    for candidate in candidates {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(PlateScaleError::WcsNotFound(fits.to_string()))
}

#[cfg(test)]
mod solver_test {
    use super::*;
    use std::fs;

    fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_solve_command_drops_empty_args() {
        let cmd = solve_command(
            Utf8Path::new("/usr/bin/solve-field"),
            Utf8Path::new("img.fits"),
            "--downsample 2  --no-plots",
        );
        assert_eq!(
            cmd,
            vec![
                "/usr/bin/solve-field",
                "--overwrite",
                "img.fits",
                "--verbose",
                "--downsample",
                "2",
                "--no-plots"
            ]
        );
        assert_eq!(solve_command(Utf8Path::new("s"), Utf8Path::new("f"), "").len(), 4);
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let missing = utf8_dir(&dir).join("nothing.fits");
        assert_eq!(
            do_solve(Utf8Path::new("solve-field"), &missing, ""),
            Err(PlateScaleError::FileNotFound(missing.to_string()))
        );
    }

    #[test]
    fn test_locate_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let exe = utf8_dir(&dir).join("solve-field");
        fs::write(&exe, "").unwrap();
        assert_eq!(locate_solver(Some(&exe)).unwrap(), exe);
    }

    #[test]
    fn test_find_wcs_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_dir(&dir);
        let fits = root.join("sky_stack.fits");
        fs::write(&fits, "").unwrap();

        assert_eq!(
            find_wcs_file(&fits, &[]),
            Err(PlateScaleError::WcsNotFound(fits.to_string()))
        );

        fs::write(root.join("wcs.fits"), "").unwrap();
        assert_eq!(find_wcs_file(&fits, &[]).unwrap(), root.join("wcs.fits"));

        let fallback = root.join("sky.wcs");
        fs::write(&fallback, "").unwrap();
        assert_eq!(find_wcs_file(&fits, &[fallback.clone()]).unwrap(), fallback);

        fs::write(root.join("sky_stack.wcs"), "").unwrap();
        assert_eq!(
            find_wcs_file(&fits, &[fallback.clone()]).unwrap(),
            root.join("sky_stack.wcs")
        );

        // a .wcs input is its own solution
        assert_eq!(find_wcs_file(&fallback, &[]).unwrap(), fallback);
    }

    #[cfg(unix)]
    fn fake_solver(dir: &Utf8Path, name: &str, body: &str) -> Utf8PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let exe = dir.join(name);
        fs::write(&exe, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        exe
    }

    #[cfg(unix)]
    #[test]
    fn test_not_solved_marker() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_dir(&dir);
        let fits = root.join("img.fits");
        fs::write(&fits, "").unwrap();

        let exe = fake_solver(&root, "unsolved", "echo reading\necho 'Did not solve (or no WCS file was written).'");
        assert_eq!(
            do_solve(&exe, &fits, ""),
            Err(PlateScaleError::NotSolved(fits.to_string()))
        );

        let exe = fake_solver(&root, "solved", "echo solved; exit 0");
        assert_eq!(do_solve(&exe, &fits, "--no-plots"), Ok(()));

        let exe = fake_solver(&root, "broken", "exit 3");
        assert!(matches!(
            do_solve(&exe, &fits, ""),
            Err(PlateScaleError::SolverFailed(_, _))
        ));
    }
}
