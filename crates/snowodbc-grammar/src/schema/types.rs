//! Abstract column type tags and their dialect spelling.

use serde::{Deserialize, Serialize};

use super::ColumnDefinition;
use crate::error::{GrammarError, Result};
use crate::value::quote_literal;

const DEFAULT_STRING_LENGTH: u32 = 255;
const DEFAULT_DECIMAL_TOTAL: u32 = 8;
const DEFAULT_DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    Char,
    String,
    Text,
    MediumText,
    LongText,
    BigInteger,
    Integer,
    MediumInteger,
    TinyInteger,
    SmallInteger,
    Float,
    Double,
    Decimal,
    Boolean,
    Enum,
    Set,
    Json,
    Jsonb,
    Date,
    DateTime,
    DateTimeTz,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Year,
    Binary,
    Uuid,
    IpAddress,
    MacAddress,
    Geometry,
    Point,
    LineString,
    Polygon,
    GeometryCollection,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    Computed,
}

impl ColumnType {
    /// Integer types that may carry `autoincrement primary key`.
    pub fn is_serial(&self) -> bool {
        matches!(
            self,
            ColumnType::BigInteger | ColumnType::Integer | ColumnType::SmallInteger
        )
    }
}

/// Rendered type plus the `default CURRENT_TIMESTAMP ...` tail that some
/// temporal types attach to themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeSql {
    pub ty: String,
    pub current_default: Option<String>,
}

impl TypeSql {
    fn plain(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            current_default: None,
        }
    }
}

pub(crate) fn type_sql(column: &ColumnDefinition) -> Result<TypeSql> {
    let precision = column.precision.filter(|p| *p > 0);

    let ty = match column.kind {
        ColumnType::Char => format!("char({})", column.length.unwrap_or(DEFAULT_STRING_LENGTH)),
        ColumnType::String => {
            format!("varchar({})", column.length.unwrap_or(DEFAULT_STRING_LENGTH))
        }
        ColumnType::Text => "text".into(),
        ColumnType::MediumText => "mediumtext".into(),
        ColumnType::LongText => "longtext".into(),
        ColumnType::BigInteger => "bigint".into(),
        ColumnType::Integer => "int".into(),
        ColumnType::MediumInteger | ColumnType::SmallInteger => "smallint".into(),
        ColumnType::TinyInteger => "tinyint".into(),
        ColumnType::Float => sized_real("float", column),
        ColumnType::Double => sized_real("double", column),
        ColumnType::Decimal => format!(
            "decimal({}, {})",
            column.total.unwrap_or(DEFAULT_DECIMAL_TOTAL),
            column.places.unwrap_or(DEFAULT_DECIMAL_PLACES)
        ),
        ColumnType::Boolean => "boolean".into(),
        ColumnType::Enum => format!("enum({})", quote_list(&column.allowed)),
        ColumnType::Set => format!("set({})", quote_list(&column.allowed)),
        ColumnType::Json | ColumnType::Jsonb => "object".into(),
        ColumnType::Date => "date".into(),
        ColumnType::DateTime | ColumnType::DateTimeTz => {
            let ty = match precision {
                Some(p) => format!("datetime({p})"),
                None => "datetime".into(),
            };
            let current_default = column
                .use_current
                .then(|| "default CURRENT_TIMESTAMP".to_owned());
            return Ok(TypeSql { ty, current_default });
        }
        ColumnType::Time | ColumnType::TimeTz => match precision {
            Some(p) => format!("time({p})"),
            None => "time".into(),
        },
        ColumnType::Timestamp | ColumnType::TimestampTz => {
            let (ty, current) = match precision {
                Some(p) => (format!("timestamp({p})"), format!("CURRENT_TIMESTAMP({p})")),
                None => ("timestamp".into(), "CURRENT_TIMESTAMP".into()),
            };
            let mut tail = Vec::new();
            if column.use_current {
                tail.push(format!("default {current}"));
            }
            if column.use_current_on_update {
                tail.push(format!("on update {current}"));
            }
            let current_default = (!tail.is_empty()).then(|| tail.join(" "));
            return Ok(TypeSql { ty, current_default });
        }
        ColumnType::Year => "year".into(),
        ColumnType::Binary => "blob".into(),
        ColumnType::Uuid => "char(36)".into(),
        ColumnType::IpAddress => "varchar(45)".into(),
        ColumnType::MacAddress => "varchar(17)".into(),
        ColumnType::Geometry => "geometry".into(),
        ColumnType::Point => "point".into(),
        ColumnType::LineString => "linestring".into(),
        ColumnType::Polygon => "polygon".into(),
        ColumnType::GeometryCollection => "geometrycollection".into(),
        ColumnType::MultiPoint => "multipoint".into(),
        ColumnType::MultiLineString => "multilinestring".into(),
        ColumnType::MultiPolygon => "multipolygon".into(),
        ColumnType::Computed => {
            return Err(GrammarError::compilation(format!(
                "column '{}' needs a concrete type; use virtual_as or stored_as instead of computed",
                column.name
            )))
        }
    };

    Ok(TypeSql::plain(ty))
}

fn sized_real(name: &str, column: &ColumnDefinition) -> String {
    match (column.total.filter(|t| *t > 0), column.places.filter(|p| *p > 0)) {
        (Some(total), Some(places)) => format!("{name}({total}, {places})"),
        _ => name.to_owned(),
    }
}

fn quote_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| quote_literal(value))
        .collect::<Vec<_>>()
        .join(", ")
}
