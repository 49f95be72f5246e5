use ampwire_frame::FrameDecoder;

use crate::cmd::{DecodeArgs, RunContext};
use crate::exit::{protocol_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::print_frame;

/// Decode every frame in a captured byte dump.
///
/// Undecodable bytes are skipped the same way a live session skips them; the
/// command still fails if anything was skipped or left over.
pub fn run(args: DecodeArgs, ctx: &RunContext) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex.join(" "))?;

    let mut decoder = FrameDecoder::new();
    decoder.push(&bytes);

    let mut decoded = 0usize;
    let mut first_error = None;
    while let Some(item) = decoder.next_frame() {
        match item {
            Ok(frame) => {
                print_frame(&frame, ctx.format);
                decoded += 1;
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping undecodable bytes");
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_error {
        return Err(protocol_error("decode failed", err));
    }
    if decoder.buffered() > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "decode failed: {} trailing byte(s) do not form a complete frame",
                decoder.buffered()
            ),
        ));
    }
    if decoded == 0 {
        return Err(CliError::new(DATA_INVALID, "decode failed: no frame found"));
    }
    Ok(SUCCESS)
}

/// Parse hex like `ff5508...`, `ff 55 08`, `ff:55:08` or `0xff 0x55`.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let mut digits = String::with_capacity(input.len());
    for token in input.split(|c: char| c.is_whitespace() || c == ':' || c == ',') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if token.len() % 2 != 0 && !token.is_empty() && token.len() <= 2 {
            digits.push('0');
        }
        digits.push_str(token);
    }

    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte: {}", &digits[i..i + 2])))
        })
        .collect()
}
