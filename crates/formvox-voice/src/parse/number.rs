//! Numeric answers: digits as recognised, or spoken number words.

/// Digits of the transcript, or the value of its number words when it has no digits.
///
/// `"Rs. 1,500"` → `"1500"`, `"five hundred"` → `"500"`, `"two lakh"` → `"200000"`.
pub fn parse_number(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        return Some(digits);
    }
    words_to_number(text).map(|n| n.to_string())
}

fn small_value(word: &str) -> Option<u64> {
    let value = match word {
        "zero" | "oh" => 0,
        "one" | "a" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(value)
}

fn scale_value(word: &str) -> Option<u64> {
    let value = match word {
        "thousand" => 1_000,
        "lakh" | "lakhs" | "lac" | "lacs" => 100_000,
        "million" => 1_000_000,
        "crore" | "crores" => 10_000_000,
        _ => return None,
    };
    Some(value)
}

/// Value of an English (Indian-English) number phrase. Unknown words are skipped;
/// `None` when no number word was found at all.
pub fn words_to_number(text: &str) -> Option<u64> {
    let lowered = text.to_lowercase();
    let words = lowered
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty());

    let mut total: u64 = 0;
    let mut current: u64 = 0;
    let mut seen = false;
    for word in words {
        if let Some(v) = small_value(word) {
            // A lone "a" only counts in front of a scale word ("a hundred").
            if word != "a" {
                seen = true;
            }
            current = current.checked_add(v)?;
        } else if word == "hundred" {
            seen = true;
            current = current.max(1).checked_mul(100)?;
        } else if let Some(scale) = scale_value(word) {
            seen = true;
            total = total.checked_add(current.max(1).checked_mul(scale)?)?;
            current = 0;
        }
    }
    seen.then(|| total.checked_add(current)).flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_digits_only() {
        assert_eq!(parse_number("Rs. 1,500").as_deref(), Some("1500"));
        assert_eq!(parse_number("500").as_deref(), Some("500"));
    }

    #[test]
    fn reads_number_words() {
        assert_eq!(parse_number("five hundred").as_deref(), Some("500"));
        assert_eq!(parse_number("two thousand five hundred and fifty").as_deref(), Some("2550"));
        assert_eq!(parse_number("one lakh twenty thousand").as_deref(), Some("120000"));
        assert_eq!(parse_number("a hundred").as_deref(), Some("100"));
        assert_eq!(parse_number("two crore").as_deref(), Some("20000000"));
        assert_eq!(parse_number("twenty-five").as_deref(), Some("25"));
    }

    #[test]
    fn rejects_text_without_numbers() {
        assert_eq!(parse_number("no idea"), None);
        assert_eq!(parse_number("a"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn overflowing_phrase_is_rejected() {
        let phrase = format!(
            "one hundred hundred hundred hundred hundred hundred crore {}",
            "nine hundred ".repeat(9)
        );
        assert_eq!(words_to_number(&phrase), None);
        assert_eq!(parse_number(&phrase), None);
    }
}
