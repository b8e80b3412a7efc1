use lazy_static::lazy_static;
use regex::Regex;

use crate::ontology::term::GOTermID;

pub const MAX_USER_VALUES: usize = 9;

#[derive(Debug, Clone)]
pub struct TermListRecord {
    pub go_id: GOTermID,
    pub raw_token: String,
    pub value: Option<f64>,
    pub user_values: Vec<f64>,
}

#[derive(Debug, Default)]
pub struct ParsedTermList {
    pub records: Vec<TermListRecord>,
    pub unparseable: Vec<String>,
    pub bad_values: Vec<String>,
}

lazy_static! {
    static ref GO_TOKEN_REGEX: Regex = Regex::new(r"^(?i:GO:?)?(\d{1,7})$").unwrap();
}

pub fn parse_go_token(token: &str) -> Option<GOTermID> {
    GO_TOKEN_REGEX
        .captures(token.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn is_comment(line: &str) -> bool {
    matches!(line.chars().next(), Some('%') | Some('#') | Some('!'))
}

// One record per line: GO id, optional primary value, then up to nine extra
// numeric columns. Unparseable extra columns become NaN; unparseable GO ids
// skip the whole line and surface as warnings.
pub fn parse_term_list(input: &str) -> ParsedTermList {
    let mut parsed = ParsedTermList::default();

    for raw_line in input.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }

        let mut fields = line
            .split(|c: char| c == ' ' || c == '\t' || c == '|' || c == '\u{b}')
            .filter(|field| !field.is_empty());

        let go_token = match fields.next() {
            Some(token) => token,
            None => continue,
        };

        let go_id = match parse_go_token(go_token) {
            Some(id) => id,
            None => {
                parsed.unparseable.push(raw_line.to_string());
                continue;
            }
        };

        let value = match fields.next() {
            Some(field) => match field.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    parsed.bad_values.push(raw_line.to_string());
                    None
                }
            },
            None => None,
        };

        let user_values: Vec<f64> = fields
            .take(MAX_USER_VALUES)
            .map(|field| field.parse::<f64>().unwrap_or(f64::NAN))
            .collect();

        parsed.records.push(TermListRecord {
            go_id,
            raw_token: go_token.to_string(),
            value,
            user_values,
        });
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_go_id_spellings() {
        assert_eq!(parse_go_token("GO:0008150"), Some(8150));
        assert_eq!(parse_go_token("GO0008150"), Some(8150));
        assert_eq!(parse_go_token("0008150"), Some(8150));
        assert_eq!(parse_go_token("go:0008150"), Some(8150));
        assert_eq!(parse_go_token("8150"), Some(8150));
        assert_eq!(parse_go_token("GO:815O"), None);
        assert_eq!(parse_go_token("process"), None);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let parsed = parse_term_list("% header\n# note\n! bang\n\nGO:0008150 0.01\n");
        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.unparseable.is_empty());
    }

    #[test]
    fn splits_on_pipes_and_tabs() {
        let parsed = parse_term_list("GO:0009987|1e-5\t3.5 7");
        let record = &parsed.records[0];
        assert_eq!(record.go_id, 9987);
        assert_eq!(record.value, Some(1e-5));
        assert_eq!(record.user_values, vec![3.5, 7.0]);
    }

    #[test]
    fn bad_extra_columns_become_nan() {
        let parsed = parse_term_list("GO:0009987 0.05 high 2.0");
        let record = &parsed.records[0];
        assert!(record.user_values[0].is_nan());
        assert_eq!(record.user_values[1], 2.0);
    }

    #[test]
    fn extra_columns_are_capped_at_nine() {
        let parsed = parse_term_list("GO:0009987 0.05 1 2 3 4 5 6 7 8 9 10 11");
        assert_eq!(parsed.records[0].user_values.len(), MAX_USER_VALUES);
    }

    #[test]
    fn non_numeric_value_column_is_flagged() {
        let parsed = parse_term_list("GO:0009987 high\nGO:0007049 0.01\n");
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].value, None);
        assert_eq!(parsed.bad_values.len(), 1);
        assert!(parsed.bad_values[0].contains("high"));
    }

    #[test]
    fn bad_go_ids_are_collected() {
        let parsed = parse_term_list("GO:0008150 0.1\nnot-a-term 0.2\n");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.unparseable.len(), 1);
        assert!(parsed.unparseable[0].contains("not-a-term"));
    }
}
