use tally_core::config::{FirebaseConfig, DEFAULT_DATABASE_ID};
use tally_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::mask_secret;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Explicit values passed to `tally config init`.
#[derive(Debug, Default)]
pub struct ProfileOverrides {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub database_id: Option<String>,
    pub firestore_url: Option<String>,
    pub identity_toolkit_url: Option<String>,
    pub secure_token_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_key,
            project_id,
            database_id,
            firestore_url,
            identity_toolkit_url,
            secure_token_url,
            request_timeout_secs,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileOverrides {
                api_key,
                project_id,
                database_id,
                firestore_url,
                identity_toolkit_url,
                secure_token_url,
                request_timeout_secs,
            },
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    overrides: ProfileOverrides,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    *profile = apply_overrides(std::mem::take(profile), overrides)?;
    let missing = missing_fields(profile);

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Profile '{profile_name}' initialized at {}", path.display());

    if missing.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `tally auth login --email <email> --password <password>`."
        );
    } else {
        println!("Profile '{profile_name}' is missing: {}", missing.join(", "));
    }
    Ok(())
}

/// Layer explicit values over a stored profile, validating URLs.
pub fn apply_overrides(
    existing: FirebaseConfig,
    overrides: ProfileOverrides,
) -> Result<FirebaseConfig, CliError> {
    let explicit = FirebaseConfig {
        api_key: normalize_text_option(overrides.api_key),
        project_id: normalize_text_option(overrides.project_id),
        database_id: normalize_text_option(overrides.database_id),
        firestore_url: normalize_text_option(overrides.firestore_url),
        identity_toolkit_url: normalize_text_option(overrides.identity_toolkit_url),
        secure_token_url: normalize_text_option(overrides.secure_token_url),
        request_timeout_secs: overrides.request_timeout_secs,
    };

    for (name, url) in [
        ("firestore_url", &explicit.firestore_url),
        ("identity_toolkit_url", &explicit.identity_toolkit_url),
        ("secure_token_url", &explicit.secure_token_url),
    ] {
        if let Some(url) = url {
            if !is_http_url(url) {
                return Err(CliError::Config(format!(
                    "{name} must include http:// or https://"
                )));
            }
        }
    }
    if explicit.request_timeout_secs == Some(0) {
        return Err(CliError::Config(
            "request_timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(explicit.or(existing))
}

pub fn missing_fields(profile: &FirebaseConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if profile.api_key.is_none() {
        missing.push("api_key");
    }
    if profile.project_id.is_none() {
        missing.push("project_id");
    }
    missing
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let active = config.active_profile.as_deref() == Some(profile_name.as_str());

    println!(
        "Profile '{profile_name}'{}",
        if active { " (active)" } else { "" }
    );
    let Some(profile) = config.profile(&profile_name) else {
        println!("  not configured");
        return Ok(());
    };
    for line in describe_profile(profile) {
        println!("  {line}");
    }

    match config.resolve_client_config(&profile_name) {
        Ok(resolved) => {
            println!("  firestore: {}", resolved.firestore_url);
            println!("  identity toolkit: {}", resolved.identity_toolkit_url);
            println!("  secure token: {}", resolved.secure_token_url);
        }
        Err(error) => println!("  incomplete: {error}"),
    }
    Ok(())
}

pub fn describe_profile(profile: &FirebaseConfig) -> Vec<String> {
    let unset = || "(unset)".to_string();
    vec![
        format!(
            "api_key: {}",
            profile.api_key.as_deref().map_or_else(unset, mask_secret)
        ),
        format!(
            "project_id: {}",
            profile.project_id.clone().unwrap_or_else(unset)
        ),
        format!(
            "database_id: {}",
            profile
                .database_id
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE_ID.to_string())
        ),
        format!(
            "request_timeout_secs: {}",
            profile
                .request_timeout_secs
                .map_or_else(|| "(default)".to_string(), |secs| secs.to_string())
        ),
    ]
}
