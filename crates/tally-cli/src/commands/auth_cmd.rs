use tally_core::auth::AuthSession;

use crate::cli::AuthCommands;
use crate::commands::common::{format_timestamp, open_context, GlobalOptions};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, options: &GlobalOptions) -> Result<(), CliError> {
    let (profile_name, context) = open_context(options).await?;
    let auth = context.auth();

    match command {
        AuthCommands::Signup { email, password } => {
            let session = auth.sign_up(&email, &password).await?;
            println!(
                "Created account for profile '{profile_name}' as {}",
                email_label(&session)
            );
        }
        AuthCommands::Login { email, password } => {
            let session = auth.sign_in(&email, &password).await?;
            println!(
                "Signed in profile '{profile_name}' as {}",
                email_label(&session)
            );
        }
        AuthCommands::ResetPassword { email } => {
            auth.reset_password(&email).await?;
            println!("Password reset email sent to {}", email.trim());
        }
        AuthCommands::Status => {
            let session = if options.offline {
                auth.current_session()?
            } else {
                auth.restore_session().await?
            };
            match session {
                Some(session) => println!("{}", describe_session(&profile_name, &session)),
                None => println!("Profile '{profile_name}' is not signed in."),
            }
        }
        AuthCommands::Logout => {
            auth.sign_out()?;
            println!("Signed out profile '{profile_name}'");
        }
    }
    Ok(())
}

fn email_label(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or("(no email)")
}

pub fn describe_session(profile_name: &str, session: &AuthSession) -> String {
    format!(
        "Profile '{profile_name}' is signed in as {} (uid={}, expires {})",
        email_label(session),
        session.user.uid,
        format_timestamp(session.expires_at.saturating_mul(1000))
    )
}
