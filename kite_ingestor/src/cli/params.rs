use std::{
    fs,
    io::{self, Read},
};

use clap::ValueEnum;
use serde::de::DeserializeOwned;

use crate::errors::Error;

/// Where a JSON argument comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum JsonSource {
    /// `--input` is a path to a JSON file.
    File,
    /// `--input` is the JSON document itself.
    Json,
    /// The document is read from standard input.
    #[default]
    Stdin,
}

/// Splits a comma-separated instrument list (e.g. "NSE:INFY, 408065").
pub fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
        .collect()
}

pub fn read_json<T: DeserializeOwned>(source: JsonSource, input: Option<&str>) -> Result<T, Error> {
    let text = match source {
        JsonSource::File => {
            let path = input.ok_or_else(|| Error::Config("File path required for source=file".into()))?;
            fs::read_to_string(path)?
        }
        JsonSource::Json => input
            .ok_or_else(|| Error::Config("JSON string required for source=json".into()))?
            .to_string(),
        JsonSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    Ok(serde_json::from_str(&text)?)
}
