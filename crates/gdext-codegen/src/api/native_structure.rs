//! Parser for native structure format strings.
//!
//! A format is a `;`-separated list of C-like field declarations with
//! optional defaults: `float left;Object *collider;int shape = 0;uint8_t data[16]`.

use crate::api::descriptor::NativeStructureField;

pub(crate) fn parse_format(format: &str) -> Result<Vec<NativeStructureField>, String> {
    format
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .map(parse_field)
        .collect()
}

fn parse_field(decl: &str) -> Result<NativeStructureField, String> {
    let (decl, default_value) = match decl.split_once('=') {
        Some((decl, default)) => {
            let default = default.trim();
            if default.is_empty() {
                return Err(format!("field `{}` has an empty default value", decl.trim()));
            }
            (decl.trim(), Some(default.to_string()))
        }
        None => (decl, None),
    };

    let (decl, array_len) = match decl.strip_suffix(']') {
        Some(rest) => {
            let (rest, len) = rest
                .rsplit_once('[')
                .ok_or_else(|| format!("unbalanced `]` in `{decl}`"))?;
            let len = len
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid array length `{}` in `{decl}`", len.trim()))?;
            (rest.trim_end(), Some(len))
        }
        None => (decl, None),
    };

    let name_start = decl
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(0, |i| i + 1);
    let name = &decl[name_start..];
    let type_part = decl[..name_start].trim();
    if name.is_empty() || type_part.is_empty() {
        return Err(format!("expected `<type> <name>`, found `{decl}`"));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("invalid field name `{name}`"));
    }

    let pointer_depth = type_part.matches('*').count();
    let type_name = type_part.trim_end_matches(|c: char| c == '*' || c.is_whitespace());
    if type_name.contains('*') || type_name.is_empty() {
        return Err(format!("malformed type `{type_part}` for field `{name}`"));
    }

    Ok(NativeStructureField {
        name: name.to_string(),
        type_name: type_name.to_string(),
        pointer_depth,
        array_len,
        default_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        let fields =
            parse_format("float left;Object *collider;int shape = 0;uint8_t data[16];").unwrap();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].name, "left");
        assert_eq!(fields[0].type_name, "float");
        assert_eq!(fields[1].type_name, "Object");
        assert_eq!(fields[1].pointer_depth, 1);
        assert_eq!(fields[2].default_value.as_deref(), Some("0"));
        assert_eq!(fields[3].array_len, Some(16));
    }

    #[test]
    fn test_scoped_and_const_types() {
        let fields = parse_format("TextServer::Direction leading_direction;const Vector3 **points").unwrap();
        assert_eq!(fields[0].type_name, "TextServer::Direction");
        assert_eq!(fields[1].type_name, "const Vector3");
        assert_eq!(fields[1].pointer_depth, 2);
    }

    #[test]
    fn test_malformed_fields() {
        assert!(parse_format("float").is_err());
        assert!(parse_format("int values[x]").is_err());
        assert!(parse_format("int shape =").is_err());
    }
}
