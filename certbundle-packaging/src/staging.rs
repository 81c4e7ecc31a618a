// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! On-disk staging for package builds. */

use {
    crate::error::Result,
    slog::warn,
    std::path::{Path, PathBuf},
};

/// Scratch layout for a single build.
///
/// Each build claims a fresh temporary directory with two sibling
/// roots: `data/` holds the tree the package installs and `control/`
/// holds the control files. Because the roots are siblings, control
/// files can never leak into the data archive or vice versa.
pub struct StagingTree {
    root: tempfile::TempDir,
    data_root: PathBuf,
    control_root: PathBuf,
    install_dir: PathBuf,
    certs_dir: PathBuf,
}

impl StagingTree {
    /// Create the staging layout for a package installing under
    /// `install_path` (an absolute path on the target system).
    pub fn create(install_path: &str) -> Result<Self> {
        let root = tempfile::Builder::new().prefix("certbundle-").tempdir()?;

        let data_root = root.path().join("data");
        let control_root = root.path().join("control");
        let install_dir = data_root.join(install_path.trim_start_matches('/'));
        let certs_dir = install_dir.join("certs");

        std::fs::create_dir_all(&certs_dir)?;
        std::fs::create_dir_all(&control_root)?;

        Ok(Self {
            root,
            data_root,
            control_root,
            install_dir,
            certs_dir,
        })
    }

    /// Root of the tree that becomes `data.tar.gz`.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Root of the tree that becomes `control.tar.gz`.
    pub fn control_root(&self) -> &Path {
        &self.control_root
    }

    /// Directory under `data_root` matching the package install path.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Certificate directory under the install path.
    pub fn certs_dir(&self) -> &Path {
        &self.certs_dir
    }

    /// Remove the scratch tree.
    ///
    /// Removal failure is logged and swallowed: by the time this runs
    /// the build has already produced its output or its error.
    pub fn close(self, logger: &slog::Logger) {
        let path = self.root.path().to_path_buf();

        if let Err(err) = self.root.close() {
            warn!(
                logger,
                "unable to remove scratch directory {}: {}",
                path.display(),
                err
            );
        }
    }
}

/// Sorted listing of a staged tree.
#[derive(Clone, Debug, Default)]
pub struct TreeListing {
    /// Directories, relative to the listing root.
    pub directories: Vec<PathBuf>,
    /// Files, relative to the listing root.
    pub files: Vec<PathBuf>,
}

/// Collect every directory and file under `root` as sorted relative
/// paths.
///
/// Sorting keeps archive output byte stable across filesystems that
/// return directory entries in arbitrary order.
pub fn list_tree(root: &Path) -> Result<TreeListing> {
    let mut listing = TreeListing::default();
    walk(root, Path::new(""), &mut listing)?;

    listing.directories.sort();
    listing.files.sort();

    Ok(listing)
}

fn walk(root: &Path, relative: &Path, listing: &mut TreeListing) -> Result<()> {
    for entry in std::fs::read_dir(root.join(relative))? {
        let entry = entry?;
        let relative_path = relative.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            listing.directories.push(relative_path.clone());
            walk(root, &relative_path, listing)?;
        } else {
            listing.files.push(relative_path);
        }
    }

    Ok(())
}
