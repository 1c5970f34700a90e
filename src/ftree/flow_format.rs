/// Prints a flow value the way Infomap itself writes them, so a parse/serialize round trip
/// is byte stable.
pub fn flow_format(value: f64) -> String {
    if value == 0.0 {
        return "0".to_owned();
    }

    if value.abs() < 1e-4 {
        return scientific(value);
    }

    let natural = value.to_string();
    if value < 10.0 && natural.len() > 11 {
        return format!("{value:.9}");
    }

    natural
}

fn scientific(value: f64) -> String {
    let formatted = format!("{value:e}");
    let Some((significand, exponent)) = formatted.split_once('e') else {
        return formatted;
    };

    let significand = match significand.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = &fraction[..fraction.len().min(5)];
            format!("{whole}.{fraction}")
        }
        None => significand.to_owned(),
    };

    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };

    format!("{significand}e{sign}{digits:0>2}")
}
