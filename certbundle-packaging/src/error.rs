// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {crate::deb::builder::BuildStage, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("invalid package configuration: {0}")]
    Config(String),

    #[error("certificate error: {0}")]
    Certificate(#[from] rcgen::RcgenError),

    #[error("RSA key generation error: {0}")]
    RsaKey(#[from] rsa::errors::Error),

    #[error("private key encoding error: {0}")]
    KeyEncode(#[from] rsa::pkcs8::Error),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template parse error: {0}")]
    TemplateParse(#[from] handlebars::TemplateError),

    #[error("template render error: {0}")]
    TemplateRender(#[from] handlebars::RenderError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ar header field {field} overflows its fixed width: {value}")]
    ArFieldOverflow {
        field: &'static str,
        value: String,
    },

    #[error("ar member {name}: payload was {actual} bytes but header declared {expected}")]
    ArMemberSizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("archive member {0} has no content")]
    EmptyArchiveMember(&'static str),

    #[error("build stage {stage} failed: {source}")]
    Stage {
        stage: BuildStage,
        source: Box<BundleError>,
    },
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, BundleError>;
