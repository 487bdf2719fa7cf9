use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use handlebars::Handlebars;
use serde::Serialize;

use crate::config;
use crate::email::EmailMessage;
use crate::error;

const BUILTIN: [(&str, &str); 4] = [
    ("verify_email.txt", include_str!("../templates/verify_email.txt.hbs")),
    ("verify_email.html", include_str!("../templates/verify_email.html.hbs")),
    ("reset_password.txt", include_str!("../templates/reset_password.txt.hbs")),
    ("reset_password.html", include_str!("../templates/reset_password.html.hbs")),
];

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error(transparent)]
    Template(#[from] handlebars::TemplateError),

    #[error("failed reading template directory \"{}\": {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Render(#[from] handlebars::RenderError),
}

impl From<TemplateError> for error::Error {
    fn from(err: TemplateError) -> Self {
        error::Error::new()
            .context("email template failure")
            .source(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mail {
    VerifyEmail,
    ResetPassword,
}

impl Mail {
    fn name(&self) -> &'static str {
        match self {
            Mail::VerifyEmail => "verify_email",
            Mail::ResetPassword => "reset_password",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Mail::VerifyEmail => "Verify your email address",
            Mail::ResetPassword => "Reset your password",
        }
    }
}

#[derive(Serialize)]
struct MailContext<'a> {
    name: &'a str,
    token: &'a str,
    expires_at: String,
}

/// registers every `*.hbs` file in the directory, the registry name is the
/// file name without the extension
fn load_template_directory(registry: &mut Handlebars<'_>, directory: &Path) -> Result<(), TemplateError> {
    let io_err = |source| TemplateError::Io {
        path: directory.to_owned(),
        source
    };

    tracing::debug!(
        path = %directory.display(),
        "loading directory",
    );

    for item in std::fs::read_dir(directory).map_err(io_err)? {
        let entry = item.map_err(io_err)?;
        let entry_path = entry.path();

        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }

        let Some(file_name) = entry_path.file_name().and_then(|v| v.to_str()) else {
            continue;
        };

        let Some(name) = file_name.strip_suffix(".hbs") else {
            tracing::debug!("non handlebars file");
            continue;
        };

        tracing::debug!(
            name = name,
            path = %entry_path.display(),
            "handlebars template",
        );

        registry.register_template_file(name, &entry_path)?;
    }

    Ok(())
}

#[derive(Debug)]
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn from_config(config: &config::Templates) -> Result<Self, TemplateError> {
        tracing::debug!("creating Templates state");

        let mut registry = Handlebars::new();

        for (name, template) in BUILTIN {
            registry.register_template_string(name, template)?;
        }

        if let Some(directory) = &config.directory {
            load_template_directory(&mut registry, directory)?;
        }

        Ok(Templates {
            registry,
        })
    }

    pub fn render_mail(
        &self,
        mail: Mail,
        to: &str,
        name: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailMessage, TemplateError> {
        let context = MailContext {
            name: if name.trim().is_empty() { "there" } else { name.trim() },
            token,
            expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        let plain_body = self.registry.render(&format!("{}.txt", mail.name()), &context)?;
        let html_body = self.registry.render(&format!("{}.html", mail.name()), &context)?;

        Ok(EmailMessage {
            to: vec![to.to_owned()],
            subject: mail.subject().to_owned(),
            plain_body,
            html_body,
        })
    }
}
