// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Template rendering for configuration and control files.

Templates are Handlebars sources loaded from a directory supplied at
build time. The template set is fixed: one configuration file template
plus the five control file templates under `debian/`. Strict mode is
enabled so a reference to an undefined variable fails the render
instead of expanding to nothing.
*/

use {
    crate::error::{BundleError, Result},
    handlebars::Handlebars,
    serde::Serialize,
    std::path::Path,
};

/// Template name for the packaged configuration file.
pub const CONFIG_TEMPLATE: &str = "config.conf";

/// Control files rendered into the control archive, in archive name
/// order.
pub const CONTROL_FILES: [&str; 5] = ["control", "preinst", "postinst", "postrm", "triggers"];

/// Control files that must be executable when installed.
pub const MAINTAINER_SCRIPTS: [&str; 3] = ["preinst", "postinst", "postrm"];

/// Template name for a control file.
pub fn control_template(file_name: &str) -> String {
    format!("debian/{}", file_name)
}

/// File name extension for template sources.
const TEMPLATE_SUFFIX: &str = ".hbs";

/// Renders the fixed template set for a package build.
#[derive(Debug)]
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Load every required template from a directory.
    ///
    /// Sources live at `<dir>/<name>.hbs`, so the control templates sit
    /// in a `debian/` subdirectory. A missing source file fails here,
    /// before any build work happens.
    pub fn from_directory(template_dir: impl AsRef<Path>) -> Result<Self> {
        let template_dir = template_dir.as_ref();

        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        for name in Self::template_names() {
            let path = template_dir.join(format!("{}{}", name, TEMPLATE_SUFFIX));
            if !path.is_file() {
                return Err(BundleError::TemplateNotFound(name));
            }

            let source = std::fs::read_to_string(&path)?;
            handlebars.register_template_string(&name, source)?;
        }

        Ok(Self { handlebars })
    }

    fn template_names() -> Vec<String> {
        let mut names = vec![CONFIG_TEMPLATE.to_string()];
        names.extend(CONTROL_FILES.iter().map(|name| control_template(name)));

        names
    }

    /// Render a template to a string.
    pub fn render(&self, name: &str, context: &impl Serialize) -> Result<String> {
        if !self.handlebars.has_template(name) {
            return Err(BundleError::TemplateNotFound(name.to_string()));
        }

        Ok(self.handlebars.render(name, context)?)
    }

    /// Render a template into a file, optionally marking it executable.
    pub fn render_to_file(
        &self,
        name: &str,
        context: &impl Serialize,
        path: &Path,
        executable: bool,
    ) -> Result<()> {
        let content = self.render(name, context)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        if executable {
            set_executable(path)?;
        }

        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;

    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
