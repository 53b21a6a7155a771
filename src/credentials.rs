use anyhow::{bail, Result};
use std::fmt;
use std::io::{self, BufRead, Write};

const USERNAME_PROMPT: &str = "username for ESPA: ";
const PASSWORD_PROMPT: &str = "password for ESPA: ";

/// ESPA basic-auth credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Use the values given on the command line or in the environment, and
    /// prompt on the terminal for whatever is missing. The password is read
    /// without echo.
    pub fn resolve(username: Option<String>, password: Option<String>) -> Result<Self> {
        let username = match username {
            Some(u) => u,
            None => prompt(&mut io::stdin().lock(), USERNAME_PROMPT)?,
        };
        let password = match password {
            Some(p) => p,
            None => non_empty(rpassword::prompt_password(PASSWORD_PROMPT)?, PASSWORD_PROMPT)?,
        };
        Ok(Self::new(username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn prompt(input: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    non_empty(answer, label)
}

fn non_empty(answer: String, label: &str) -> Result<String> {
    let answer = answer.trim_end_matches(['\r', '\n']);
    if answer.is_empty() {
        bail!("No value entered for '{}'", label.trim_end_matches([':', ' ']));
    }
    Ok(answer.to_string())
}
