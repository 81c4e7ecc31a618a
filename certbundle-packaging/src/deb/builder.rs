// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Create .deb package files bundling a PKI and rendered configuration. */

use {
    crate::{
        certs::{CertificateProvider, RsaPkiProvider},
        config::PackageConfig,
        deb::{gzip_compress, DebArchive},
        error::{BundleError, Result},
        staging::{list_tree, StagingTree, TreeListing},
        templates::{
            control_template, TemplateRenderer, CONFIG_TEMPLATE, CONTROL_FILES, MAINTAINER_SCRIPTS,
        },
    },
    md5::{Digest, Md5},
    serde::Serialize,
    slog::warn,
    std::{
        io::{Cursor, Read, Write},
        path::{Path, PathBuf},
        time::SystemTime,
    },
};

/// Pipeline stages, in execution order.
///
/// A failed build reports the stage it stopped in alongside the
/// underlying cause.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildStage {
    CleanPrior,
    Stage,
    GenerateSecrets,
    RenderConfig,
    RenderControl,
    TarControl,
    TarData,
    WriteVersionMarker,
    AssembleAr,
    FinalCleanup,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CleanPrior => "clean-prior",
            Self::Stage => "stage",
            Self::GenerateSecrets => "generate-secrets",
            Self::RenderConfig => "render-config",
            Self::RenderControl => "render-control",
            Self::TarControl => "tar-control",
            Self::TarData => "tar-data",
            Self::WriteVersionMarker => "write-version-marker",
            Self::AssembleAr => "assemble-ar",
            Self::FinalCleanup => "final-cleanup",
        })
    }
}

fn run_stage<T>(stage: BuildStage, result: Result<T>) -> Result<T> {
    result.map_err(|source| BundleError::Stage {
        stage,
        source: Box::new(source),
    })
}

/// Template context for the five control files.
#[derive(Serialize)]
struct ControlContext<'a> {
    package_name: &'a str,
    version: &'a str,
    architecture: &'a str,
    section: &'a str,
    priority: &'a str,
    maintainer: &'a str,
    description: &'a str,
    long_description: &'a str,
    install_path: &'a str,
    config_name: &'a str,
}

impl<'a> ControlContext<'a> {
    fn new(config: &'a PackageConfig) -> Self {
        let package = &config.package;

        Self {
            package_name: &package.name,
            version: &package.version,
            architecture: &package.architecture,
            section: &package.section,
            priority: &package.priority,
            maintainer: &package.maintainer,
            description: &package.description,
            long_description: &package.long_description,
            install_path: &package.install_path,
            config_name: &package.config_name,
        }
    }
}

/// Template context for the configuration file.
#[derive(Serialize)]
struct ConfigContext<'a> {
    package_name: &'a str,
    description: &'a str,
    install_path: &'a str,
    config: &'a serde_yaml::Mapping,
}

/// Drives a single package build end to end.
///
/// The pipeline is linear and terminal on first failure: clean stale
/// output, create the staging tree, generate the PKI, render the
/// configuration and control files, produce both tarballs, then
/// assemble the outer ar archive. The scratch tree is removed on
/// success and failure alike, and the output file only appears once
/// assembly has completed.
pub struct PackageBuilder {
    config: PackageConfig,
    renderer: TemplateRenderer,
    certificate_provider: Box<dyn CertificateProvider>,
    output_dir: PathBuf,
    mtime: Option<SystemTime>,
}

impl PackageBuilder {
    /// Construct a builder using the default RSA PKI provider.
    pub fn new(config: PackageConfig, renderer: TemplateRenderer) -> Self {
        Self {
            config,
            renderer,
            certificate_provider: Box::new(RsaPkiProvider::default()),
            output_dir: PathBuf::from("."),
            mtime: None,
        }
    }

    /// Set the directory the final `.deb` is written to.
    pub fn set_output_dir(mut self, output_dir: impl AsRef<Path>) -> Self {
        self.output_dir = output_dir.as_ref().to_path_buf();
        self
    }

    /// Replace the certificate provider.
    pub fn set_certificate_provider(mut self, provider: Box<dyn CertificateProvider>) -> Self {
        self.certificate_provider = provider;
        self
    }

    /// Set the modified time used for every archive member.
    ///
    /// If this is called, all archive members will use the specified
    /// time, helping to make archive content deterministic.
    ///
    /// If not called, the current time will be used.
    pub fn set_mtime(mut self, time: Option<SystemTime>) -> Self {
        self.mtime = time;
        self
    }

    fn mtime(&self) -> u64 {
        self.mtime
            .unwrap_or_else(std::time::SystemTime::now)
            .duration_since(std::time::UNIX_EPOCH)
            .expect("times before UNIX epoch not accepted")
            .as_secs()
    }

    /// Path the final archive is written to.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(self.config.deb_filename())
    }

    /// Run the build, returning the path of the written `.deb`.
    pub fn build(&self, logger: &slog::Logger) -> Result<PathBuf> {
        let output_path = self.output_path();

        run_stage(BuildStage::CleanPrior, clean_prior(&output_path))?;

        let staging = run_stage(
            BuildStage::Stage,
            StagingTree::create(&self.config.package.install_path),
        )?;

        let result = self.run_pipeline(logger, &staging, &output_path);

        // Best effort, success and failure alike.
        staging.close(logger);

        result
    }

    fn run_pipeline(
        &self,
        logger: &slog::Logger,
        staging: &StagingTree,
        output_path: &Path,
    ) -> Result<PathBuf> {
        warn!(logger, "generating certificates");
        run_stage(
            BuildStage::GenerateSecrets,
            self.certificate_provider
                .provision(logger, staging.certs_dir()),
        )?;

        warn!(logger, "rendering configuration file");
        run_stage(BuildStage::RenderConfig, self.render_config(staging))?;

        warn!(logger, "rendering control files");
        run_stage(BuildStage::RenderControl, self.render_control(staging))?;

        warn!(logger, "creating control.tar.gz");
        let control_tar_gz = run_stage(BuildStage::TarControl, self.build_control_tar(staging))?;

        warn!(logger, "creating data.tar.gz");
        let data_tar_gz = run_stage(BuildStage::TarData, self.build_data_tar(staging))?;

        let archive = run_stage(
            BuildStage::WriteVersionMarker,
            DebArchive::new(control_tar_gz, data_tar_gz),
        )?;

        warn!(logger, "assembling {}", output_path.display());
        run_stage(
            BuildStage::AssembleAr,
            self.write_archive(&archive, output_path),
        )?;

        Ok(output_path.to_path_buf())
    }

    fn render_config(&self, staging: &StagingTree) -> Result<()> {
        let package = &self.config.package;
        let context = ConfigContext {
            package_name: &package.name,
            description: &package.description,
            install_path: &package.install_path,
            config: &self.config.config,
        };

        self.renderer.render_to_file(
            CONFIG_TEMPLATE,
            &context,
            &staging.install_dir().join(&package.config_name),
            false,
        )
    }

    fn render_control(&self, staging: &StagingTree) -> Result<()> {
        let context = ControlContext::new(&self.config);

        for file_name in CONTROL_FILES {
            let executable = MAINTAINER_SCRIPTS.contains(&file_name);

            self.renderer.render_to_file(
                &control_template(file_name),
                &context,
                &staging.control_root().join(file_name),
                executable,
            )?;
        }

        Ok(())
    }

    /// Produce `control.tar.gz`, including an `md5sums` entry covering
    /// every file in the data tree.
    fn build_control_tar(&self, staging: &StagingTree) -> Result<Vec<u8>> {
        let md5sums = data_tree_md5sums(staging.data_root())?;
        std::fs::write(staging.control_root().join("md5sums"), md5sums)?;

        let listing = list_tree(staging.control_root())?;
        let mut tar_data = vec![];
        write_tree_tar(&mut tar_data, staging.control_root(), &listing, self.mtime())?;

        gzip_compress(&mut Cursor::new(tar_data))
    }

    fn build_data_tar(&self, staging: &StagingTree) -> Result<Vec<u8>> {
        let listing = list_tree(staging.data_root())?;
        let mut tar_data = vec![];
        write_tree_tar(&mut tar_data, staging.data_root(), &listing, self.mtime())?;

        gzip_compress(&mut Cursor::new(tar_data))
    }

    /// Write the assembled archive, only surfacing it under its final
    /// name once every byte is on disk.
    fn write_archive(&self, archive: &DebArchive, output_path: &Path) -> Result<()> {
        let output_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(output_dir)?;

        archive.write_to(&mut temp, self.mtime())?;
        temp.flush()?;

        temp.persist(output_path)
            .map_err(|err| BundleError::Io(err.error))?;

        Ok(())
    }
}

/// Remove a stale output artifact from an earlier run.
fn clean_prior(output_path: &Path) -> Result<()> {
    match std::fs::remove_file(output_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// `md5sums` content for a staged data tree: one
/// `<hex digest>  <relative path>` line per file, in listing order.
fn data_tree_md5sums(data_root: &Path) -> Result<Vec<u8>> {
    let listing = list_tree(data_root)?;

    let mut entries = vec![];
    for file in &listing.files {
        let data = std::fs::read(data_root.join(file))?;
        let digest = Md5::digest(&data);

        entries.extend_from_slice(hex::encode(digest).as_bytes());
        entries.extend_from_slice(b"  ");
        entries.extend_from_slice(file.to_string_lossy().as_bytes());
        entries.push(b'\n');
    }

    Ok(entries)
}

fn new_tar_header(mtime: u64) -> Result<tar::Header> {
    let mut header = tar::Header::new_gnu();
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root")?;
    header.set_groupname("root")?;
    header.set_mtime(mtime);

    Ok(header)
}

fn set_entry_path(
    builder: &mut tar::Builder<impl Write>,
    header: &mut tar::Header,
    path: &Path,
    is_directory: bool,
) -> Result<()> {
    // Debian archives in the wild have filenames beginning with `./`,
    // and paths ending with `/` are directories. `header.set_path()`
    // normalizes the `./` away for everything except the root, so the
    // name field is written directly. GNU headers only.
    assert!(header.as_ustar().is_none());

    let value = format!(
        "./{}{}",
        path.display(),
        if is_directory { "/" } else { "" }
    );
    let value_bytes = value.as_bytes();

    let name_buffer = &mut header.as_old_mut().name;

    if value_bytes.len() <= name_buffer.len() {
        name_buffer[0..value_bytes.len()].copy_from_slice(value_bytes);
    } else {
        // Longer names get a GNU @LongLink entry carrying the full
        // name, followed by the truncated real header.
        let mut long_header = tar::Header::new_gnu();
        let name = b"././@LongLink";
        long_header.as_gnu_mut().unwrap().name[..name.len()].clone_from_slice(&name[..]);
        long_header.set_mode(0o644);
        long_header.set_uid(0);
        long_header.set_gid(0);
        long_header.set_mtime(0);
        long_header.set_size(value_bytes.len() as u64 + 1);
        long_header.set_entry_type(tar::EntryType::new(b'L'));
        long_header.set_cksum();
        let mut data = value_bytes.chain(std::io::repeat(0).take(1));
        builder.append(&long_header, &mut data)?;

        let truncated_bytes = &value_bytes[0..name_buffer.len()];
        name_buffer[0..truncated_bytes.len()].copy_from_slice(truncated_bytes);
    }

    Ok(())
}

/// Write a tar stream for a staged tree, suitable for inclusion in a
/// `.deb` archive.
///
/// Entries are rooted at `./`: the root entry itself, one entry per
/// directory, then one per file, in the deterministic order of the
/// listing. Directories are mode 0755; files are 0644, or 0755 when
/// executable on disk.
pub fn write_tree_tar<W: Write>(
    writer: W,
    root: &Path,
    listing: &TreeListing,
    mtime: u64,
) -> Result<()> {
    let mut builder = tar::Builder::new(writer);

    // Add root directory entry.
    let mut header = new_tar_header(mtime)?;
    header.set_path(Path::new("./"))?;
    header.set_mode(0o755);
    header.set_size(0);
    header.set_cksum();
    builder.append(&header, &*vec![])?;

    // And entries for each directory in the tree.
    for directory in &listing.directories {
        let mut header = new_tar_header(mtime)?;
        set_entry_path(&mut builder, &mut header, directory, true)?;
        header.set_mode(0o755);
        header.set_size(0);
        header.set_cksum();
        builder.append(&header, &*vec![])?;
    }

    for file in &listing.files {
        let path = root.join(file);
        let data = std::fs::read(&path)?;
        let executable = is_executable(&std::fs::metadata(&path)?);

        let mut header = new_tar_header(mtime)?;
        set_entry_path(&mut builder, &mut header, file, false)?;
        header.set_mode(if executable { 0o755 } else { 0o644 });
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append(&header, &*data)?;
    }

    builder.finish()?;

    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}
