//! HTML pages rendered to the user's browser after the callback
//!
//! Terminal-flow artifacts only; the programmatic outcome travels over the
//! flow channels, not these pages.

pub const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization complete</title></head>
<body style="font-family: sans-serif; text-align: center; margin-top: 4em;">
  <h1>Authorization complete</h1>
  <p>You can close this window and return to the terminal.</p>
</body>
</html>"#;

pub const ERROR_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization failed</title></head>
<body style="font-family: sans-serif; text-align: center; margin-top: 4em;">
  <h1>Authorization failed</h1>
  <p>Something went wrong. Check the terminal for details.</p>
</body>
</html>"#;

pub const CANCELLED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization cancelled</title></head>
<body style="font-family: sans-serif; text-align: center; margin-top: 4em;">
  <h1>Authorization cancelled</h1>
  <p>Access was not granted. You can close this window.</p>
</body>
</html>"#;
