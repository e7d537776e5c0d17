//! Value converters: per-type string serialization for stored settings.
//!
//! A [`ConverterSet`] maps a Rust type (by [`TypeId`]) to a [`Converter`]
//! pair.  [`ConverterSet::with_defaults`] covers the primitive types plus
//! `Uuid`, [`CompactGuid`] and `DateTime<Utc>`.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::display::DisplayName;
use crate::error::AppError;
use crate::guid::CompactGuid;

type FormatFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
type ParseFn<T> = Box<dyn Fn(&str) -> Result<T, String> + Send + Sync>;

/// Serialize/deserialize pair for one value type.
pub struct Converter<T> {
    format: FormatFn<T>,
    parse: ParseFn<T>,
}

impl<T> Converter<T> {
    pub fn new(
        format: impl Fn(&T) -> String + Send + Sync + 'static,
        parse: impl Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            format: Box::new(format),
            parse: Box::new(parse),
        }
    }

    pub fn format(&self, value: &T) -> String {
        (self.format)(value)
    }

    pub fn parse(&self, raw: &str) -> Result<T, String> {
        (self.parse)(raw)
    }
}

#[derive(Clone)]
struct Entry {
    type_name: &'static str,
    converter: Arc<dyn Any + Send + Sync>,
}

/// Registry of converters keyed by target type.
///
/// Cloning is cheap: converters are shared behind `Arc`.
#[derive(Clone, Default)]
pub struct ConverterSet {
    entries: HashMap<TypeId, Entry>,
}

impl ConverterSet {
    /// An empty set. Every conversion fails until something is registered.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut set = Self::new();

        macro_rules! parse_types {
            ($set:ident; $($t:ty),+ $(,)?) => { $( $set.register_parse::<$t>(); )+ };
        }
        parse_types!(
            set;
            String, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32,
            f64, CompactGuid,
        );

        // Accepts `True`/`FALSE` etc. as well as the lowercase forms.
        set.register(Converter::new(
            |v: &bool| v.to_string(),
            |s| {
                if s.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(format!("'{s}' is not a boolean"))
                }
            },
        ));
        set.register(Converter::new(
            |v: &Uuid| v.hyphenated().to_string(),
            |s| Uuid::parse_str(s).map_err(|e| e.to_string()),
        ));
        set.register(Converter::new(
            |v: &DateTime<Utc>| v.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            |s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| e.to_string())
            },
        ));
        set
    }

    /// Register (or replace) the converter for `T`.
    pub fn register<T: 'static>(&mut self, converter: Converter<T>) -> &mut Self {
        self.entries.insert(
            TypeId::of::<T>(),
            Entry {
                type_name: type_name::<T>(),
                converter: Arc::new(converter),
            },
        );
        self
    }

    /// Register `T` using its `Display` and `FromStr` impls.
    pub fn register_parse<T>(&mut self) -> &mut Self
    where
        T: FromStr + Display + 'static,
        T::Err: Display,
    {
        self.register(Converter::new(
            |v: &T| v.to_string(),
            |s| s.parse::<T>().map_err(|e| e.to_string()),
        ))
    }

    /// Register an enum that is stored by its display name.
    pub fn register_display<T: DisplayName>(&mut self) -> &mut Self {
        self.register(Converter::new(
            |v: &T| v.display_name().to_string(),
            |s| T::from_display_name(s).ok_or_else(|| format!("'{s}' is not a known name")),
        ))
    }

    pub fn get<T: 'static>(&self) -> Option<&Converter<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|e| e.converter.downcast_ref::<Converter<T>>())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of all registered types, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        names
    }

    /// Serialize `value` with the converter for `T`.
    pub fn format_value<T: 'static>(&self, value: &T) -> Result<String, AppError> {
        Ok(self.require::<T>()?.format(value))
    }

    /// Parse the stored `raw` value of `key` into `T`.
    pub fn parse_value<T: 'static>(&self, key: &str, raw: &str) -> Result<T, AppError> {
        self.require::<T>()?.parse(raw).map_err(|e| {
            AppError::Conversion(format!(
                "value of '{key}' is not a valid {}: {e}",
                type_name::<T>()
            ))
        })
    }

    fn require<T: 'static>(&self) -> Result<&Converter<T>, AppError> {
        self.get::<T>().ok_or_else(|| {
            AppError::Conversion(format!("no converter registered for {}", type_name::<T>()))
        })
    }
}

impl std::fmt::Debug for ConverterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterSet")
            .field("types", &self.type_names())
            .finish()
    }
}
