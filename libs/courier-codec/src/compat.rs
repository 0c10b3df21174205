use apache_avro::Schema;
use courier_api::schema::type_name;

/// Why a reader schema cannot decode data written with a writer schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Incompatibility {
    #[error("both schemas must be records")]
    NotARecord,

    #[error("writer record '{writer}' differs from reader record '{reader}'")]
    RecordName { writer: String, reader: String },

    #[error("field '{field}' changed type from {writer} to {reader}")]
    TypeChanged {
        field: String,
        writer: String,
        reader: String,
    },

    #[error("field '{field}' is new and has no default")]
    MissingDefault { field: String },
}

/// Check that data written with `writer` can be decoded with `reader`.
///
/// Rules: same record full name; fields present in both keep the exact same
/// type (no promotion); reader-only fields declare a default; writer-only
/// fields are skipped.
pub fn check_readable(writer: &Schema, reader: &Schema) -> Result<(), Incompatibility> {
    let (Schema::Record(w), Schema::Record(r)) = (writer, reader) else {
        return Err(Incompatibility::NotARecord);
    };

    let writer_name = w.name.fullname(None);
    let reader_name = r.name.fullname(None);
    if writer_name != reader_name {
        return Err(Incompatibility::RecordName {
            writer: writer_name,
            reader: reader_name,
        });
    }

    for field in &r.fields {
        match w.fields.iter().find(|f| f.name == field.name) {
            Some(old) => {
                if old.schema.canonical_form() != field.schema.canonical_form() {
                    return Err(Incompatibility::TypeChanged {
                        field: field.name.clone(),
                        writer: type_name(&old.schema),
                        reader: type_name(&field.schema),
                    });
                }
            }
            None if field.default.is_none() => {
                return Err(Incompatibility::MissingDefault {
                    field: field.name.clone(),
                });
            }
            None => {}
        }
    }
    Ok(())
}
