//! # Grid-file sources
//!
//! [`SpectraSource`] abstracts where grid files come from, so the interpolation layer
//! never touches the filesystem or the network directly. The shipped implementation,
//! [`TieredSource`], resolves a file in two steps: a local cache directory, then the
//! remote archive (with write-through into the local directory).
//!
//! Files are flat little-endian binaries: two `u64` dimensions (number of viewing
//! cosines, number of wavelength samples), the viewing-cosine array, then one intensity
//! row per viewing cosine.

use camino::Utf8PathBuf;

use super::spectra::{GridKey, RawSpectra};
use crate::env_state::OblateEnv;
use crate::oblate_errors::OblateError;

const GRID_FILE_EXTENSION: &str = ".specint.bin";

/// Where grid files come from. Implementations must return the same axes for every key.
pub trait SpectraSource {
    /// Produce the decoded content of the grid file identified by `key`.
    fn fetch(&self, key: GridKey) -> Result<RawSpectra, OblateError>;
}

/// Local-directory source with a remote archive fallback.
pub struct TieredSource {
    local_dir: Utf8PathBuf,
    remote_base: Option<String>,
    metallicity_suffix: String,
    env: OblateEnv,
}

impl TieredSource {
    /// Arguments
    /// -----------------
    /// * `metallicity_suffix`: the metallicity tag embedded in the file names, e.g. `-0.0`.
    /// * `local_dir`: cache directory; `None` selects the per-user cache location.
    /// * `remote_base`: base URL of the remote archive; `None` disables downloads.
    /// * `env`: shared environment carrying the HTTP client.
    pub fn new(
        metallicity_suffix: &str,
        local_dir: Option<Utf8PathBuf>,
        remote_base: Option<String>,
        env: OblateEnv,
    ) -> Result<Self, OblateError> {
        let local_dir = match local_dir {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };
        std::fs::create_dir_all(&local_dir)
            .map_err(|e| OblateError::UnableToCreateBaseDir(e.to_string()))?;
        Ok(TieredSource {
            local_dir,
            remote_base,
            metallicity_suffix: metallicity_suffix.to_owned(),
            env,
        })
    }

    fn file_name(&self, key: GridKey) -> String {
        format!(
            "{}{}",
            key.file_stem(&self.metallicity_suffix),
            GRID_FILE_EXTENSION
        )
    }
}

impl SpectraSource for TieredSource {
    fn fetch(&self, key: GridKey) -> Result<RawSpectra, OblateError> {
        let file_name = self.file_name(key);
        let local_path = self.local_dir.join(&file_name);

        if local_path.is_file() {
            let bytes = std::fs::read(&local_path)?;
            return decode_grid_file(&bytes, &file_name);
        }

        let base = self
            .remote_base
            .as_ref()
            .ok_or_else(|| OblateError::GridFileNotFound(file_name.clone()))?;

        println!("Downloading atmosphere grid file {file_name} ...");
        let url = format!("{}/{}", base.trim_end_matches('/'), file_name);
        let bytes = self.env.get_bytes(url.as_str())?;
        let spectra = decode_grid_file(&bytes, &file_name)?;

        // Write-through so the next run resolves locally.
        std::fs::write(&local_path, &bytes)?;
        println!("Stored {file_name} in {}", self.local_dir);

        Ok(spectra)
    }
}

fn default_cache_dir() -> Result<Utf8PathBuf, OblateError> {
    let dirs = directories::ProjectDirs::from("", "", "oblate").ok_or_else(|| {
        OblateError::UnableToCreateBaseDir("no valid home directory".to_string())
    })?;
    Utf8PathBuf::from_path_buf(dirs.cache_dir().to_path_buf())
        .map_err(|p| OblateError::Utf8PathError(p.display().to_string()))
}

fn read_u64_le(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn read_f64_le(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

/// Decode one flat binary grid file, validating the advertised dimensions against the
/// actual byte count before touching the payload.
pub fn decode_grid_file(bytes: &[u8], name: &str) -> Result<RawSpectra, OblateError> {
    let invalid =
        |reason: String| OblateError::InvalidGridFile(name.to_owned(), reason);

    if bytes.len() < 16 {
        return Err(invalid(format!("file too short: {} bytes", bytes.len())));
    }
    let n_mu = read_u64_le(bytes, 0) as usize;
    let n_wav = read_u64_le(bytes, 8) as usize;
    if n_mu == 0 || n_wav == 0 {
        return Err(invalid(format!("degenerate dimensions {n_mu} x {n_wav}")));
    }

    let expected = n_mu
        .checked_mul(n_wav)
        .and_then(|cells| cells.checked_add(n_mu))
        .and_then(|doubles| doubles.checked_mul(8))
        .and_then(|payload| payload.checked_add(16))
        .ok_or_else(|| invalid(format!("dimensions overflow: {n_mu} x {n_wav}")))?;
    if bytes.len() != expected {
        return Err(invalid(format!(
            "expected {expected} bytes for {n_mu} x {n_wav}, found {}",
            bytes.len()
        )));
    }

    let mu: Vec<f64> = (0..n_mu).map(|i| read_f64_le(bytes, 16 + 8 * i)).collect();
    let rows_start = 16 + 8 * n_mu;
    let intensities: Vec<Vec<f64>> = (0..n_mu)
        .map(|r| {
            let row_start = rows_start + 8 * r * n_wav;
            (0..n_wav)
                .map(|c| read_f64_le(bytes, row_start + 8 * c))
                .collect()
        })
        .collect();

    Ok(RawSpectra { mu, intensities })
}

/// Encode a table in the flat binary layout. Mainly useful for seeding test fixtures
/// and local caches.
pub fn encode_grid_file(spectra: &RawSpectra) -> Vec<u8> {
    let n_mu = spectra.mu.len();
    let n_wav = spectra.intensities.first().map_or(0, Vec::len);
    let mut bytes = Vec::with_capacity(16 + 8 * (n_mu + n_mu * n_wav));
    bytes.extend_from_slice(&(n_mu as u64).to_le_bytes());
    bytes.extend_from_slice(&(n_wav as u64).to_le_bytes());
    for &m in &spectra.mu {
        bytes.extend_from_slice(&m.to_le_bytes());
    }
    for row in &spectra.intensities {
        for &v in row {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    bytes
}
