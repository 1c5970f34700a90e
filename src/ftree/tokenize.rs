use std::fmt;

/// One whitespace/quote separated field of a row, typed the way the parser expects it.
///
/// Numbers keep the token as written so identifiers like `0042` print back unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Number { value: f64, raw: String },
    Text(String),
}

impl Field {
    pub fn number(raw: &str) -> Option<Self> {
        let value = raw.parse::<f64>().ok().filter(|value| value.is_finite())?;
        Some(Self::Number {
            value,
            raw: raw.to_owned(),
        })
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number { value, .. } => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Non-negative integer value, accepting only numbers without a fractional part.
    pub fn as_id(&self) -> Option<u32> {
        let value = self.as_number()?;
        if value.fract() != 0.0 || !(0.0..=u32::MAX as f64).contains(&value) {
            return None;
        }
        Some(value as u32)
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Self::Text(text) if text.starts_with('*'))
    }

    pub fn header_is(&self, name: &str) -> bool {
        matches!(self, Self::Text(text) if text.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number { raw, .. } => f.write_str(raw),
            Self::Text(text) => f.write_str(text),
        }
    }
}

pub type Row = Vec<Field>;

/// Splits raw text into typed rows, dropping blank lines and `#` comments.
pub fn tokenize(text: &str) -> Vec<Row> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(tokenize_line)
        .filter(|row| !row.is_empty())
        .collect()
}

fn tokenize_line(line: &str) -> Row {
    let mut fields = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch == '"' {
            chars.next();
            let mut text = String::new();
            while let Some((_, next)) = chars.next() {
                match next {
                    '"' => break,
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            text.push(escaped);
                        }
                    }
                    _ => text.push(next),
                }
            }
            fields.push(Field::Text(text));
            continue;
        }

        let mut end = line.len();
        while let Some(&(index, next)) = chars.peek() {
            if next.is_whitespace() {
                end = index;
                break;
            }
            chars.next();
        }

        let raw = &line[start..end];
        fields.push(Field::number(raw).unwrap_or_else(|| Field::Text(raw.to_owned())));
    }

    fields
}
