//! crates/vibeprep_core/src/otp.rs
//!
//! One-time code generation and the verification email that carries it.

use rand::Rng;

use crate::ports::{OtpGenerator, OutgoingEmail};

pub const OTP_LENGTH: usize = 6;

/// Draws each digit independently from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOtpGenerator;

impl OtpGenerator for RandomOtpGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..OTP_LENGTH)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}

pub const OTP_EMAIL_SUBJECT: &str = "Vibeprep - Email Verification Code";

/// Builds the HTML verification message for `recipient`.
pub fn otp_email(recipient: &str, first_name: &str, otp: &str, ttl_minutes: i64) -> OutgoingEmail {
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <style>
        .container {{ max-width: 600px; margin: 0 auto; font-family: Arial, sans-serif; }}
        .header {{ background-color: #4CAF50; color: white; padding: 20px; text-align: center; }}
        .content {{ padding: 20px; background-color: #f9f9f9; }}
        .otp-code {{ background-color: #e7f3ff; padding: 15px; text-align: center; font-size: 24px; font-weight: bold; border-radius: 5px; margin: 20px 0; }}
        .footer {{ padding: 20px; text-align: center; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header"><h1>Vibeprep - Email Verification</h1></div>
        <div class="content">
            <h2>Hello {first_name}!</h2>
            <p>Thank you for signing up with Vibeprep. To complete your registration, please use the following OTP:</p>
            <div class="otp-code">{otp}</div>
            <p>This OTP will expire in {ttl_minutes} minutes.</p>
            <p>If you didn't request this verification, please ignore this email.</p>
        </div>
        <div class="footer"><p>Vibeprep. All rights reserved.</p></div>
    </div>
</body>
</html>
"#,
        first_name = escape_html(first_name),
    );

    OutgoingEmail {
        recipients: vec![recipient.to_string()],
        subject: OTP_EMAIL_SUBJECT.to_string(),
        html_body,
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
