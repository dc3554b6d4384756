use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use log::info;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Date format used in the parameters file (`31-12-2024`).
pub const PARAM_DATE_FORMAT: &str = "%d-%m-%Y";

/// API credentials loaded once from `api_cred.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "ClientID")]
    pub client_id: String,
    #[serde(rename = "SecretID")]
    pub secret_id: String,
    #[serde(rename = "RedirectURI")]
    pub redirect_uri: String,
    #[serde(rename = "ResponseType")]
    pub response_type: String,
    #[serde(rename = "GrantType")]
    pub grant_type: String,
}

impl Credentials {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let credentials: Credentials = load_json(path)?;
        for (field, value) in [
            ("ClientID", &credentials.client_id),
            ("SecretID", &credentials.secret_id),
            ("RedirectURI", &credentials.redirect_uri),
            ("ResponseType", &credentials.response_type),
            ("GrantType", &credentials.grant_type),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::config(path, format!("`{field}` must not be empty")));
            }
        }
        info!("successfully read {}", path.display());
        Ok(credentials)
    }

    /// Port of the local callback listener, taken from the tail of the redirect URI.
    pub fn redirect_port(&self) -> Result<u16> {
        self.redirect_uri
            .rsplit(':')
            .next()
            .map(|tail| tail.trim_end_matches('/'))
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| {
                AppError::message(format!(
                    "cannot determine callback port from redirect URI `{}`",
                    self.redirect_uri
                ))
            })
    }
}

/// Parameters for one historical fetch, loaded from `data_parameters.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchParams {
    #[serde(rename = "ScriptName")]
    pub script_name: String,
    #[serde(rename = "Resolution")]
    pub resolution: String,
    #[serde(rename = "StartDate")]
    pub start_date: String,
    #[serde(rename = "EndDate")]
    pub end_date: String,
}

impl FetchParams {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let params: FetchParams = load_json(path)?;
        if params.script_name.trim().is_empty() {
            return Err(AppError::config(path, "`ScriptName` must not be empty"));
        }
        if params.resolution.trim().is_empty() {
            return Err(AppError::config(path, "`Resolution` must not be empty"));
        }
        for (field, value) in [("StartDate", &params.start_date), ("EndDate", &params.end_date)] {
            if NaiveDate::parse_from_str(value, PARAM_DATE_FORMAT).is_err() {
                return Err(AppError::config(
                    path,
                    format!("`{field}` is not a dd-mm-YYYY date: `{value}`"),
                ));
            }
        }
        info!("successfully read {}", path.display());
        Ok(params)
    }

    pub fn start(&self) -> Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(&self.start_date, PARAM_DATE_FORMAT)?)
    }

    pub fn end(&self) -> Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(&self.end_date, PARAM_DATE_FORMAT)?)
    }
}

/// Read the persisted access token, trimming surrounding whitespace.
pub fn read_access_token<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|err| AppError::config(path, format!("access token unreadable: {err}")))?;
    let token = contents.trim().to_string();
    if token.is_empty() {
        return Err(AppError::config(path, "access token file is empty"));
    }
    info!("successfully read access token from {}", path.display());
    Ok(token)
}

/// Persist the access token as plain text, overwriting any prior token.
pub fn write_access_token<P: AsRef<Path>>(path: P, token: &str) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, token)?;
    info!("access token written to {}", path.display());
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .map_err(|err| AppError::config(path, err.to_string()))?;
    serde_json::from_str(&contents).map_err(|err| AppError::config(path, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn loads_credentials() {
        let file = write_temp(
            r#"{
                "ClientID": "ABCD1234-100",
                "SecretID": "XYZSECRET",
                "RedirectURI": "http://127.0.0.1:8080/",
                "ResponseType": "code",
                "GrantType": "authorization_code"
            }"#,
        );

        let credentials = Credentials::load(file.path()).unwrap();

        assert_eq!(credentials.client_id, "ABCD1234-100");
        assert_eq!(credentials.grant_type, "authorization_code");
        assert_eq!(credentials.redirect_port().unwrap(), 8080);
    }

    #[test]
    fn rejects_credentials_with_empty_field() {
        let file = write_temp(
            r#"{
                "ClientID": "",
                "SecretID": "XYZSECRET",
                "RedirectURI": "http://127.0.0.1:8080",
                "ResponseType": "code",
                "GrantType": "authorization_code"
            }"#,
        );

        let err = Credentials::load(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn rejects_malformed_credentials_json() {
        let file = write_temp("not json at all");
        let err = Credentials::load(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn loads_fetch_params_and_parses_dates() {
        let file = write_temp(
            r#"{
                "ScriptName": "NSE:SBIN-EQ",
                "Resolution": "D",
                "StartDate": "01-01-2024",
                "EndDate": "31-03-2024"
            }"#,
        );

        let params = FetchParams::load(file.path()).unwrap();

        assert_eq!(params.start().unwrap(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(params.end().unwrap(), NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    }

    #[test]
    fn rejects_params_with_bad_date() {
        let file = write_temp(
            r#"{
                "ScriptName": "NSE:SBIN-EQ",
                "Resolution": "D",
                "StartDate": "2024-01-01",
                "EndDate": "31-03-2024"
            }"#,
        );

        let err = FetchParams::load(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn access_token_round_trip_is_trimmed() {
        let file = tempfile::NamedTempFile::new().unwrap();

        write_access_token(file.path(), "tok-123").unwrap();
        assert_eq!(read_access_token(file.path()).unwrap(), "tok-123");

        fs::write(file.path(), "  tok-456\n").unwrap();
        assert_eq!(read_access_token(file.path()).unwrap(), "tok-456");
    }

    #[test]
    fn missing_token_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_access_token(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }
}
