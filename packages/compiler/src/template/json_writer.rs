//! Streaming JSON writer.
//!
//! The emitter writes the template document incrementally, depth-first, in a
//! fixed structural order. Scalar tokens and property names go through
//! serde_json so escaping stays correct; this type only tracks structure and
//! separators.

use std::io::{self, Write};

#[derive(Debug, Clone, Copy)]
enum Scope {
    Object { first: bool, key_pending: bool },
    Array { first: bool },
}

#[derive(Debug)]
pub struct JsonWriter<W: Write> {
    out: W,
    stack: Vec<Scope>,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(out: W) -> Self {
        JsonWriter {
            out,
            stack: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_start_object(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.stack.push(Scope::Object {
            first: true,
            key_pending: false,
        });
        self.out.write_all(b"{")
    }

    pub fn write_end_object(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(Scope::Object { .. }) => self.out.write_all(b"}"),
            _ => Err(unbalanced("object end without matching start")),
        }
    }

    pub fn write_start_array(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.stack.push(Scope::Array { first: true });
        self.out.write_all(b"[")
    }

    pub fn write_end_array(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(Scope::Array { .. }) => self.out.write_all(b"]"),
            _ => Err(unbalanced("array end without matching start")),
        }
    }

    pub fn write_property_name(&mut self, name: &str) -> io::Result<()> {
        match self.stack.last_mut() {
            Some(Scope::Object { first, key_pending }) => {
                if !*first {
                    self.out.write_all(b",")?;
                }
                *first = false;
                *key_pending = true;
            }
            _ => return Err(unbalanced("property name outside of an object")),
        }

        serialize_into(&mut self.out, name)?;
        self.out.write_all(b":")
    }

    pub fn write_string(&mut self, value: &str) -> io::Result<()> {
        self.before_value()?;
        serialize_into(&mut self.out, value)
    }

    pub fn write_int(&mut self, value: i64) -> io::Result<()> {
        self.before_value()?;
        write!(self.out, "{value}")
    }

    pub fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.before_value()?;
        write!(self.out, "{value}")
    }

    pub fn write_null(&mut self) -> io::Result<()> {
        self.before_value()?;
        self.out.write_all(b"null")
    }

    fn before_value(&mut self) -> io::Result<()> {
        match self.stack.last_mut() {
            Some(Scope::Object { key_pending, .. }) => {
                if !*key_pending {
                    return Err(unbalanced("value in object position without a property name"));
                }
                *key_pending = false;
                Ok(())
            }
            Some(Scope::Array { first }) => {
                if !*first {
                    self.out.write_all(b",")?;
                }
                *first = false;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn serialize_into<W: Write>(out: &mut W, value: &str) -> io::Result<()> {
    serde_json::to_writer(out, value).map_err(io::Error::other)
}

fn unbalanced(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}
