//! `bazaar login ...` and `bazaar logout`

use bazaar_client::{LoginSync, ShopContext};
use bazaar_core::{Email, OtpCode, PhoneNumber};
use tracing::warn;

use super::CliError;

/// Which OTP endpoint to use.
#[derive(Debug, Clone, Copy)]
pub enum Channel {
    Customer,
    Resend,
    Admin,
}

/// Request a login code.
///
/// # Errors
///
/// Returns an error for a malformed phone number or a rejected request.
#[allow(clippy::print_stdout)]
pub async fn send(shop: &ShopContext, phone: &str, channel: Channel) -> Result<(), CliError> {
    let phone = PhoneNumber::parse(phone)?;
    let auth = shop.auth();
    let message = match channel {
        Channel::Customer => auth.send_otp(&phone).await?,
        Channel::Resend => auth.resend_otp(&phone).await?,
        Channel::Admin => auth.send_admin_otp(&phone).await?,
    };
    println!("{message}");
    Ok(())
}

/// Verify a code, start the session and merge the local cart.
///
/// # Errors
///
/// Returns an error for malformed input or a rejected code.
#[allow(clippy::print_stdout)]
pub async fn verify(
    shop: &ShopContext,
    phone: &str,
    otp: &str,
    email: Option<&str>,
) -> Result<(), CliError> {
    let phone = PhoneNumber::parse(phone)?;
    let otp = OtpCode::parse(otp)?;
    let email = email.map(Email::parse).transpose()?;

    let sync = shop.sign_in_with_otp(&phone, &otp, email.as_ref()).await?;
    println!("Signed in.");
    match sync {
        LoginSync::Merged { pushed, failed } if failed > 0 => {
            println!("Merged your cart ({pushed} lines saved, {failed} could not be saved).");
        }
        LoginSync::Merged { pushed, .. } => println!("Merged {pushed} cart lines into your account."),
        LoginSync::FellBack { error } => {
            warn!(%error, "Cart sync failed");
            println!("{}", error.notice());
        }
        LoginSync::SignedOut { error } => println!("{}", error.notice()),
        LoginSync::Interrupted => println!("Signed out before your cart could be merged."),
        LoginSync::AdoptedServer | LoginSync::AlreadyRunning | LoginSync::Anonymous => {}
    }
    Ok(())
}

/// End the session.
#[allow(clippy::print_stdout)]
pub fn logout(shop: &ShopContext) {
    shop.logout();
    println!("Signed out. Your cart is still saved on this device.");
}
