use crate::serializer::config::SerializerConfig;
use crate::serializer::error::SerializationError;
use crate::snapshot::{
    Domain, DomainDirective, Field, Modifiers, Provider, ProviderUse, Record, Snapshot,
};

pub struct SerializerVisitor {
    config: SerializerConfig,
    indent_level: usize,
    output: String,
}

impl SerializerVisitor {
    pub fn new(config: SerializerConfig) -> Self {
        Self {
            config,
            indent_level: 0,
            output: String::new(),
        }
    }

    pub fn serialize_snapshot(
        &mut self,
        snapshot: &Snapshot,
        source_name: Option<&str>,
    ) -> Result<String, SerializationError> {
        if self.config.banner {
            match source_name {
                Some(name) => {
                    let name = comment_safe(name);
                    self.write(&format!("// Generated by dnslua from {}. Do not edit.", name))?
                }
                None => self.write("// Generated by dnslua. Do not edit.")?,
            }
            self.newline()?;
            self.newline()?;
        }

        for provider in &snapshot.providers {
            self.serialize_provider(provider)?;
            self.newline()?;
        }
        if !snapshot.providers.is_empty() && !snapshot.domains.is_empty() {
            self.newline()?;
        }

        for (i, domain) in snapshot.domains.iter().enumerate() {
            if i > 0 {
                self.newline()?;
            }
            self.serialize_domain(domain)?;
            self.newline()?;
        }

        Ok(std::mem::take(&mut self.output))
    }

    /// `NewDnsProvider("name", "TYPE", {config});`
    fn serialize_provider(&mut self, provider: &Provider) -> Result<(), SerializationError> {
        self.write(&provider.role.to_string())?;
        self.write("(")?;
        self.write_string(&provider.name)?;
        if provider.provider_type.is_some() || provider.config.is_some() {
            self.write(", ")?;
            self.write_string(provider.provider_type.as_deref().unwrap_or("-"))?;
        }
        if let Some(config) = &provider.config {
            self.write(", ")?;
            self.write_map(config.entries())?;
        }
        self.write(");")
    }

    fn serialize_domain(&mut self, domain: &Domain) -> Result<(), SerializationError> {
        self.write("D(")?;
        self.write_string(&domain.name)?;
        self.write(", ")?;
        self.write_string(&domain.registrar)?;

        let items = domain.providers.len()
            + domain.records.len()
            + domain.directives.len()
            + usize::from(!domain.modifiers.is_empty());
        if items == 0 {
            return self.write(");");
        }

        self.write(",")?;
        self.indent();
        let mut remaining = items;
        let mut separator = |visitor: &mut Self| -> Result<(), SerializationError> {
            remaining -= 1;
            if remaining > 0 {
                visitor.write(",")?;
            }
            Ok(())
        };
        for provider in &domain.providers {
            self.newline()?;
            self.serialize_provider_use(provider)?;
            separator(self)?;
        }
        let mut directives = domain.directives.iter().peekable();
        for (position, record) in domain.records.iter().enumerate() {
            while let Some(directive) = directives.next_if(|d| d.position <= position) {
                self.newline()?;
                self.serialize_directive(directive)?;
                separator(self)?;
            }
            self.newline()?;
            self.serialize_record(record)?;
            separator(self)?;
        }
        for directive in directives {
            self.newline()?;
            self.serialize_directive(directive)?;
            separator(self)?;
        }
        if !domain.modifiers.is_empty() {
            self.newline()?;
            self.write_map(&domain.modifiers)?;
            separator(self)?;
        }
        self.dedent();
        self.newline()?;
        self.write(");")
    }

    fn serialize_provider_use(&mut self, provider: &ProviderUse) -> Result<(), SerializationError> {
        self.write("DnsProvider(")?;
        self.write_string(&provider.name)?;
        if let Some(count) = &provider.nameserver_count {
            self.write(", ")?;
            self.write_field(count)?;
        }
        self.write(")")
    }

    /// `NO_PURGE` or `IGNORE("www", undefined, "*.cdn")`.
    fn serialize_directive(
        &mut self,
        directive: &DomainDirective,
    ) -> Result<(), SerializationError> {
        self.write(&directive.name)?;
        let Some(args) = &directive.args else {
            return Ok(());
        };
        self.write("(")?;
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ")?;
            }
            match arg {
                Some(field) => self.write_field(field)?,
                None => self.write("undefined")?,
            }
        }
        self.write(")")
    }

    /// Positional fields first, then the modifiers as one trailing literal.
    fn serialize_record(&mut self, record: &Record) -> Result<(), SerializationError> {
        self.write(&record.record_type.to_string())?;
        self.write("(")?;
        for (i, field) in record.fields.iter().enumerate() {
            if i > 0 {
                self.write(", ")?;
            }
            self.write_field(field)?;
        }
        if !record.modifiers.is_empty() {
            self.write(", ")?;
            self.write_map(&record.modifiers)?;
        }
        self.write(")")
    }

    fn write_field(&mut self, field: &Field) -> Result<(), SerializationError> {
        match field {
            Field::String(s) => self.write_string(s),
            Field::Integer(i) => self.write(&i.to_string()),
            Field::Float(f) => {
                let text = format_float(*f)?;
                self.write(&text)
            }
            Field::Boolean(b) => self.write(if *b { "true" } else { "false" }),
            Field::Map(map) => self.write_map(map),
        }
    }

    /// `{key: value, "other-key": value}` in first-introduction order.
    fn write_map(&mut self, map: &Modifiers<Field>) -> Result<(), SerializationError> {
        self.write("{")?;
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 {
                self.write(", ")?;
            }
            if is_identifier(key) {
                self.write(key)?;
            } else {
                self.write_string(key)?;
            }
            self.write(": ")?;
            self.write_field(value)?;
        }
        self.write("}")
    }

    fn write_string(&mut self, value: &str) -> Result<(), SerializationError> {
        let escaped = escape_string(value);
        self.write(&escaped)
    }

    fn write(&mut self, text: &str) -> Result<(), SerializationError> {
        self.output.push_str(text);
        Ok(())
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    fn newline(&mut self) -> Result<(), SerializationError> {
        self.output.push('\n');
        self.write(&" ".repeat(self.indent_level * self.config.indent_spaces))
    }
}

/// Floats always carry a fraction or an exponent so they read back as floats.
fn format_float(value: f64) -> Result<String, SerializationError> {
    if !value.is_finite() {
        return Err(SerializationError::NonFinite {
            value,
            context: "serialized field".to_string(),
        });
    }
    Ok(format!("{:?}", value))
}

/// Text placed in a line comment: control characters and line separators
/// would end the comment early.
fn comment_safe(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            c if c.is_control() => '?',
            '\u{2028}' | '\u{2029}' => '?',
            c => c,
        })
        .collect()
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Double-quoted string literal. Non-ASCII text passes through except the
/// line separators, which end a JavaScript string literal.
pub(crate) fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
