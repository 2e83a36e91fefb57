//! Format-preserving masks for PII that must stay recognisable in stored payloads and logs.
//!
//! Masked values keep their shape (separators, domain suffix, digit count tail) so that support
//! staff can correlate records with provider dashboards without the stored copy being usable PII.

/// Masks an email address, keeping the first character of the local part and of the domain name,
/// and the full TLD. `jane.doe@example.com` becomes `j***@e***.com`.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return mask_digits(email);
    };
    let local_masked = match local.chars().next() {
        Some(c) => format!("{c}***"),
        None => "***".to_string(),
    };
    let domain_masked = match domain.rsplit_once('.') {
        Some((name, tld)) => match name.chars().next() {
            Some(c) => format!("{c}***.{tld}"),
            None => format!("***.{tld}"),
        },
        None => "***".to_string(),
    };
    format!("{local_masked}@{domain_masked}")
}

/// Masks all but the last two digits of a string, preserving punctuation and spacing.
/// Useful for tax ids and phone numbers: `123.456.789-09` becomes `***.***.***-09`.
pub fn mask_digits(value: &str) -> String {
    let total_digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let keep_from = total_digits.saturating_sub(2);
    let mut seen = 0usize;
    value
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen > keep_from {
                    c
                } else {
                    '*'
                }
            } else {
                c
            }
        })
        .collect()
}

/// Masks a personal name down to the first given name plus initials: `Jane Mary Doe` → `Jane M. D.`
pub fn mask_name(name: &str) -> String {
    let mut words = name.split_whitespace();
    let Some(first) = words.next() else {
        return String::new();
    };
    let mut result = first.to_string();
    for word in words {
        if let Some(c) = word.chars().next() {
            result.push(' ');
            result.push(c);
            result.push('.');
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn email_masking_keeps_shape() {
        assert_eq!(mask_email("jane.doe@example.com"), "j***@e***.com");
        assert_eq!(mask_email("a@b.co"), "a***@b***.co");
        assert_eq!(mask_email("root@localhost"), "r***@***");
    }

    #[test]
    fn email_without_at_falls_back_to_digit_mask() {
        assert_eq!(mask_email("5551234"), "*****34");
    }

    #[test]
    fn digit_masking_preserves_punctuation() {
        assert_eq!(mask_digits("123.456.789-09"), "***.***.***-09");
        assert_eq!(mask_digits("+55 11 91234-5678"), "+** ** *****-**78");
        assert_eq!(mask_digits("42"), "42");
        assert_eq!(mask_digits(""), "");
    }

    #[test]
    fn name_masking_keeps_first_name() {
        assert_eq!(mask_name("Jane Mary Doe"), "Jane M. D.");
        assert_eq!(mask_name("Cher"), "Cher");
        assert_eq!(mask_name(""), "");
    }
}
