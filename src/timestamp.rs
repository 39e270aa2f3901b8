use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::sequence::preceded;

fn stamp(input: &str) -> IResult<&str, &str> {
    preceded(alt((tag("signatureTimestamp:"), tag("sts:"))), digit1)(input)
}

/// The digits after the first `signatureTimestamp:` or `sts:` in a player script.
pub fn signature_timestamp(text: &str) -> Option<String> {
    text.char_indices()
        .filter(|(_,c)|*c == 's')
        .find_map(|(i,_)|stamp(&text[i..]).ok())
        .map(|(_,digits)|digits.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn either_key() {
        assert_eq!(signature_timestamp("a={signatureTimestamp:19834,b:1}"), Some("19834".to_string()));
        assert_eq!(signature_timestamp("x.sts:20001;"), Some("20001".to_string()));
    }

    #[test]
    fn first_with_digits_wins() {
        assert_eq!(signature_timestamp("sts:abc, signatureTimestamp:7, sts:8"), Some("7".to_string()));
    }

    #[test]
    fn absent() {
        assert_eq!(signature_timestamp("var sts = 5;"), None);
        assert_eq!(signature_timestamp(""), None);
    }
}
