use std::fs;
use std::path::{Path, PathBuf};
use reqwest::Client;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::InstallConfig;
use crate::error::{Result, ConvertError};
use crate::media::MediaCommandBuilder;

/// Paths produced by a successful installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// `bin/ffmpeg`, the renamed unpacked build
    pub install_dir: PathBuf,
    /// The ffmpeg binary inside the build
    pub executable: PathBuf,
    /// Launcher script that puts the build on PATH
    pub wrapper: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarXz,
}

impl ArchiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.xz") {
            Some(ArchiveKind::TarXz)
        } else {
            None
        }
    }
}

/// Release asset name for an OS/architecture pair as reported by
/// `std::env::consts`.
pub fn archive_name(os: &str, arch: &str) -> Result<String> {
    let wide = arch.ends_with("64");
    let name = match os {
        "windows" => {
            let arch = if wide { "win64" } else { "win32" };
            format!("ffmpeg-master-latest-{}-gpl.zip", arch)
        }
        "linux" => {
            let arch = if wide { "linux64" } else { "linux32" };
            format!("ffmpeg-master-latest-{}-static.tar.xz", arch)
        }
        "macos" => "ffmpeg-master-latest-macos64-gpl.zip".to_string(),
        other => {
            return Err(ConvertError::Install(format!("Unsupported system: {}", other)));
        }
    };
    Ok(name)
}

/// Downloads and unpacks a prebuilt ffmpeg next to the working directory
pub struct Installer {
    client: Client,
    config: InstallConfig,
    root: PathBuf,
}

impl Installer {
    pub fn new(config: InstallConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mediaconv/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConvertError::Http)?;

        Ok(Self {
            client,
            config,
            root: PathBuf::from("."),
        })
    }

    /// Install under `root` instead of the working directory
    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = root.into();
        self
    }

    fn bin_dir(&self) -> PathBuf {
        self.root.join(&self.config.bin_dir)
    }

    fn install_dir(&self) -> PathBuf {
        self.bin_dir().join(&self.config.install_dir_name)
    }

    fn executable(&self) -> PathBuf {
        let name = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
        self.install_dir().join("bin").join(name)
    }

    fn wrapper_path(&self) -> PathBuf {
        let name = if cfg!(windows) { "ffmpeg.bat" } else { "ffmpeg.sh" };
        self.root.join(name)
    }

    /// Download URL for the running host
    pub fn download_url(&self) -> Result<String> {
        let name = archive_name(std::env::consts::OS, std::env::consts::ARCH)?;
        Ok(format!("{}/{}", self.config.base_url.trim_end_matches('/'), name))
    }

    /// Download, unpack, wrap and verify ffmpeg.
    pub async fn install(&self) -> Result<InstallOutcome> {
        let executable = self.executable();
        if executable.exists() {
            info!("ffmpeg already installed at {}", executable.display());
            return self.finish(executable).await;
        }

        let url = self.download_url()?;
        let file_name = url.rsplit('/').next().unwrap_or("ffmpeg-archive").to_string();
        let kind = ArchiveKind::from_name(&file_name).ok_or_else(|| {
            ConvertError::Install(format!("Unsupported archive format: {}", file_name))
        })?;
        let archive_path = self.root.join(&file_name);

        info!("Downloading ffmpeg: {}", file_name);
        self.download(&url, &archive_path).await?;

        info!("Extracting ffmpeg...");
        let bin_dir = self.bin_dir();
        let archive = archive_path.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive, kind, &bin_dir))
            .await
            .map_err(|e| ConvertError::Install(format!("Extraction task failed: {}", e)))??;

        promote_build_dir(&self.bin_dir(), &self.config.install_dir_name)?;
        info!("ffmpeg extracted to {}", self.install_dir().display());

        async_fs::remove_file(&archive_path).await?;
        info!("Removed downloaded archive {}", archive_path.display());

        self.finish(executable).await
    }

    async fn finish(&self, executable: PathBuf) -> Result<InstallOutcome> {
        let install_dir = self.install_dir();
        if !install_dir.join("bin").is_dir() {
            return Err(ConvertError::Install(format!(
                "No bin directory in {}",
                install_dir.display()
            )));
        }

        let wrapper = self.wrapper_path();
        write_wrapper(&wrapper, &self.config.bin_dir, &self.config.install_dir_name)?;
        info!("Wrapper script created: {}", wrapper.display());

        self.verify(&executable).await?;
        Ok(InstallOutcome {
            install_dir,
            executable,
            wrapper,
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ConvertError::Install(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let pb = ProgressBar::new(response.content_length().unwrap_or(0));
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .map_err(|e| ConvertError::Install(e.to_string()))?
            .progress_chars("#>-"));

        // Write to a temporary name so an interrupted download is never mistaken for an archive
        let temp_path = dest.with_extension("part");
        let mut file = async_fs::File::create(&temp_path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            pb.inc(chunk.len() as u64);
        }
        file.flush().await?;
        drop(file);

        async_fs::rename(&temp_path, dest).await?;
        pb.finish_with_message("Downloaded ffmpeg");
        info!("Downloaded {} to {}", url, dest.display());
        Ok(())
    }

    async fn verify(&self, executable: &Path) -> Result<()> {
        info!("Testing ffmpeg...");
        if !executable.exists() {
            return Err(ConvertError::Install(format!(
                "ffmpeg executable not found at {}",
                executable.display()
            )));
        }

        let output = MediaCommandBuilder::new(executable.to_string_lossy())
            .version_check()
            .execute()
            .await?;
        if !output.success() {
            return Err(ConvertError::Install(format!(
                "ffmpeg failed to run: {}",
                output.stderr.trim()
            )));
        }

        info!("ffmpeg works: {}", output.stdout.lines().next().unwrap_or_default());
        Ok(())
    }
}

/// Unpack `archive` into `dest`, creating it when missing.
pub fn extract_archive(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    let file = fs::File::open(archive)?;
    match kind {
        ArchiveKind::Zip => {
            let mut zip = zip::ZipArchive::new(file)?;
            zip.extract(dest)?;
        }
        ArchiveKind::TarXz => {
            let decoder = xz2::read::XzDecoder::new(file);
            tar::Archive::new(decoder).unpack(dest)?;
        }
    }
    Ok(())
}

/// Rename the unpacked `ffmpeg-*` build directory in `bin_dir` to `name`.
pub fn promote_build_dir(bin_dir: &Path, name: &str) -> Result<PathBuf> {
    let mut builds: Vec<PathBuf> = fs::read_dir(bin_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with("ffmpeg-"))
                    .unwrap_or(false)
        })
        .collect();
    builds.sort();

    let build = builds.into_iter().next().ok_or_else(|| {
        ConvertError::Install(format!("No ffmpeg-* folder found in {}", bin_dir.display()))
    })?;
    let target = bin_dir.join(name);
    if target.exists() {
        warn!("Replacing existing {}", target.display());
        fs::remove_dir_all(&target)?;
    }
    fs::rename(&build, &target)?;
    Ok(target)
}

/// Launcher that prepends the unpacked build to PATH and forwards all arguments.
pub fn write_wrapper(path: &Path, bin_dir: &str, install_dir_name: &str) -> Result<()> {
    let content = if cfg!(windows) {
        format!(
            "@echo off\r\nset FFMPEG_PATH=%~dp0{}\\{}\\bin\r\nset PATH=%FFMPEG_PATH%;%PATH%\r\nffmpeg.exe %*\r\n",
            bin_dir, install_dir_name
        )
    } else {
        format!(
            "#!/bin/bash\nexport FFMPEG_PATH=\"$(dirname \"$0\")/{}/{}/bin\"\nexport PATH=\"$FFMPEG_PATH:$PATH\"\nffmpeg \"$@\"\n",
            bin_dir, install_dir_name
        )
    };
    fs::write(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}
