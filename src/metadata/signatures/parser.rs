use crate::{
    file::parser::Parser,
    metadata::signatures::{
        SignatureArray, SignatureField, SignatureMethod, SignatureParameter, TypeSignature,
        ELEMENT_TYPE,
    },
    Error::RecursionLimit,
    Result,
};

/// Maximum nesting depth of a type signature.
const MAX_RECURSION_DEPTH: usize = 50;

/// Parser for signature blobs.
pub struct SignatureParser<'a> {
    parser: Parser<'a>,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    /// Create a parser over one signature blob.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            depth: 0,
        }
    }

    /// Parse a standalone type, as stored in `TypeSpec` blobs.
    ///
    /// # Errors
    /// Returns an error for truncated or invalid signatures.
    pub fn parse_type_spec(&mut self) -> Result<TypeSignature> {
        self.skip_custom_mods()?;
        self.parse_type()
    }

    fn parse_type(&mut self) -> Result<TypeSignature> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeSignature> {
        let current_byte = self.parser.read_le::<u8>()?;
        match current_byte {
            ELEMENT_TYPE::VOID => Ok(TypeSignature::Void),
            ELEMENT_TYPE::BOOLEAN => Ok(TypeSignature::Boolean),
            ELEMENT_TYPE::CHAR => Ok(TypeSignature::Char),
            ELEMENT_TYPE::I1 => Ok(TypeSignature::I1),
            ELEMENT_TYPE::U1 => Ok(TypeSignature::U1),
            ELEMENT_TYPE::I2 => Ok(TypeSignature::I2),
            ELEMENT_TYPE::U2 => Ok(TypeSignature::U2),
            ELEMENT_TYPE::I4 => Ok(TypeSignature::I4),
            ELEMENT_TYPE::U4 => Ok(TypeSignature::U4),
            ELEMENT_TYPE::I8 => Ok(TypeSignature::I8),
            ELEMENT_TYPE::U8 => Ok(TypeSignature::U8),
            ELEMENT_TYPE::R4 => Ok(TypeSignature::R4),
            ELEMENT_TYPE::R8 => Ok(TypeSignature::R8),
            ELEMENT_TYPE::STRING => Ok(TypeSignature::String),
            ELEMENT_TYPE::PTR => {
                self.skip_custom_mods()?;
                Ok(TypeSignature::Ptr(Box::new(self.parse_type()?)))
            }
            ELEMENT_TYPE::BYREF => Ok(TypeSignature::ByRef(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::VALUETYPE => Ok(TypeSignature::ValueType(
                self.parser.read_compressed_token()?,
            )),
            ELEMENT_TYPE::CLASS => Ok(TypeSignature::Class(self.parser.read_compressed_token()?)),
            ELEMENT_TYPE::VAR => Ok(TypeSignature::GenericParamType(
                self.parser.read_compressed_uint()?,
            )),
            ELEMENT_TYPE::ARRAY => {
                let elem_type = self.parse_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                for _ in 0..num_sizes {
                    self.parser.read_compressed_uint()?;
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                for _ in 0..num_lo_bounds {
                    self.parser.read_compressed_int()?;
                }

                Ok(TypeSignature::Array(SignatureArray {
                    base: Box::new(elem_type),
                    rank,
                }))
            }
            ELEMENT_TYPE::GENERICINST => {
                let peek_byte = self.parser.peek_byte()?;
                if peek_byte != ELEMENT_TYPE::CLASS && peek_byte != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                        peek_byte
                    ));
                }

                let base_type = self.parse_type()?;
                let arg_count = self.parser.read_compressed_uint()?;

                let mut type_args = Vec::with_capacity(arg_count.min(64) as usize);
                for _ in 0..arg_count {
                    type_args.push(self.parse_type()?);
                }

                Ok(TypeSignature::GenericInst(Box::new(base_type), type_args))
            }
            ELEMENT_TYPE::TYPEDBYREF => Ok(TypeSignature::TypedByRef),
            ELEMENT_TYPE::I => Ok(TypeSignature::I),
            ELEMENT_TYPE::U => Ok(TypeSignature::U),
            ELEMENT_TYPE::FNPTR => Ok(TypeSignature::FnPtr(Box::new(
                self.parse_method_signature()?,
            ))),
            ELEMENT_TYPE::OBJECT => Ok(TypeSignature::Object),
            ELEMENT_TYPE::SZARRAY => {
                self.skip_custom_mods()?;
                Ok(TypeSignature::SzArray(Box::new(self.parse_type()?)))
            }
            ELEMENT_TYPE::MVAR => Ok(TypeSignature::GenericParamMethod(
                self.parser.read_compressed_uint()?,
            )),
            ELEMENT_TYPE::CMOD_REQD | ELEMENT_TYPE::CMOD_OPT => {
                self.parser.read_compressed_token()?;
                self.parse_type()
            }
            ELEMENT_TYPE::PINNED => Ok(TypeSignature::Pinned(Box::new(self.parse_type()?))),
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {}",
                current_byte
            )),
        }
    }

    fn skip_custom_mods(&mut self) -> Result<()> {
        while self.parser.has_more_data() {
            let next_byte = self.parser.peek_byte()?;
            if next_byte != ELEMENT_TYPE::CMOD_OPT && next_byte != ELEMENT_TYPE::CMOD_REQD {
                break;
            }

            self.parser.read_le::<u8>()?;
            self.parser.read_compressed_token()?;
        }

        Ok(())
    }

    fn parse_param(&mut self) -> Result<SignatureParameter> {
        self.skip_custom_mods()?;

        let mut by_ref = false;
        if self.parser.peek_byte()? == ELEMENT_TYPE::BYREF {
            self.parser.read_le::<u8>()?;
            by_ref = true;
        }

        Ok(SignatureParameter {
            by_ref,
            base: self.parse_type()?,
        })
    }

    /// Parse a method signature.
    ///
    /// Parameters after a vararg sentinel belong to the call site and are skipped.
    ///
    /// # Errors
    /// Returns an error for truncated or invalid signatures.
    pub fn parse_method_signature(&mut self) -> Result<SignatureMethod> {
        let convention_byte = self.parser.read_le::<u8>()?;

        let param_count_generic = if convention_byte & 0x10 != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };
        let param_count = self.parser.read_compressed_uint()?;

        let mut method = SignatureMethod {
            has_this: convention_byte & 0x20 != 0,
            explicit_this: convention_byte & 0x40 != 0,
            vararg: convention_byte & 0x0F == 0x05,
            param_count_generic,
            return_type: self.parse_param()?,
            params: Vec::with_capacity(param_count.min(64) as usize),
        };

        for _ in 0..param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                break;
            }

            method.params.push(self.parse_param()?);
        }

        Ok(method)
    }

    /// Parse a field signature.
    ///
    /// # Errors
    /// Returns an error if the blob does not start with `FIELD` (0x06) or is invalid.
    pub fn parse_field_signature(&mut self) -> Result<SignatureField> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != 0x06 {
            return Err(malformed_error!(
                "SignatureField - invalid start - {}",
                head_byte
            ));
        }

        self.skip_custom_mods()?;
        Ok(SignatureField {
            base: self.parse_type()?,
        })
    }

    /// Parse a local variable signature (`LOCAL_SIG`), as referenced by fat method bodies.
    ///
    /// # Errors
    /// Returns an error if the blob does not start with `LOCAL_SIG` (0x07) or is invalid.
    pub fn parse_local_var_signature(&mut self) -> Result<Vec<TypeSignature>> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != 0x07 {
            return Err(malformed_error!(
                "SignatureLocalVariables - invalid start - {}",
                head_byte
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut locals = Vec::with_capacity(count.min(256) as usize);
        for _ in 0..count {
            self.skip_custom_mods()?;
            locals.push(self.parse_type()?);
        }

        Ok(locals)
    }

    /// Parse the type arguments of a `MethodSpec` instantiation blob.
    ///
    /// # Errors
    /// Returns an error if the blob does not start with `GENERICINST` (0x0A) or is invalid.
    pub fn parse_method_spec_signature(&mut self) -> Result<Vec<TypeSignature>> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != 0x0A {
            return Err(malformed_error!(
                "SignatureMethodSpec - invalid start - {}",
                head_byte
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut arguments = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            arguments.push(self.parse_type()?);
        }

        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    #[test]
    fn method_instance_void() {
        // instance void (int32, string)
        let data = [0x20, 0x02, 0x01, 0x08, 0x0E];
        let method = SignatureParser::new(&data).parse_method_signature().unwrap();

        assert!(method.has_this);
        assert_eq!(method.return_type.base, TypeSignature::Void);
        assert_eq!(
            method.params,
            vec![
                SignatureParameter {
                    by_ref: false,
                    base: TypeSignature::I4
                },
                SignatureParameter {
                    by_ref: false,
                    base: TypeSignature::String
                },
            ]
        );
    }

    #[test]
    fn method_generic_byref() {
        // static !!0 Get<T>(ref !!0, class TypeRef[2][])
        let data = [0x10, 0x01, 0x02, 0x1E, 0x00, 0x10, 0x1E, 0x00, 0x1D, 0x12, 0x09];
        let method = SignatureParser::new(&data).parse_method_signature().unwrap();

        assert!(!method.has_this);
        assert_eq!(method.param_count_generic, 1);
        assert_eq!(method.return_type.base, TypeSignature::GenericParamMethod(0));
        assert!(method.params[0].by_ref);
        assert_eq!(
            method.params[1].base,
            TypeSignature::SzArray(Box::new(TypeSignature::Class(Token::new(0x0100_0002))))
        );
    }

    #[test]
    fn field_generic_instance() {
        // List`1<int32> via TypeRef row 3
        let data = [0x06, 0x15, 0x12, 0x0D, 0x01, 0x08];
        let field = SignatureParser::new(&data).parse_field_signature().unwrap();

        assert_eq!(
            field.base,
            TypeSignature::GenericInst(
                Box::new(TypeSignature::Class(Token::new(0x0100_0003))),
                vec![TypeSignature::I4]
            )
        );
    }

    #[test]
    fn field_with_modifier() {
        // modreq(IsVolatile) int32
        let data = [0x06, 0x1F, 0x05, 0x08];
        let field = SignatureParser::new(&data).parse_field_signature().unwrap();
        assert_eq!(field.base, TypeSignature::I4);
    }

    #[test]
    fn local_variables() {
        // int32, pinned uint8&, string
        let data = [0x07, 0x03, 0x08, 0x45, 0x10, 0x05, 0x0E];
        let locals = SignatureParser::new(&data)
            .parse_local_var_signature()
            .unwrap();

        assert_eq!(
            locals,
            vec![
                TypeSignature::I4,
                TypeSignature::Pinned(Box::new(TypeSignature::ByRef(Box::new(TypeSignature::U1)))),
                TypeSignature::String,
            ]
        );
        assert!(SignatureParser::new(&[0x06, 0x01, 0x08])
            .parse_local_var_signature()
            .is_err());
    }

    #[test]
    fn method_spec() {
        // <string, !!0>
        let data = [0x0A, 0x02, 0x0E, 0x1E, 0x00];
        let arguments = SignatureParser::new(&data)
            .parse_method_spec_signature()
            .unwrap();

        assert_eq!(
            arguments,
            vec![TypeSignature::String, TypeSignature::GenericParamMethod(0)]
        );
        assert!(SignatureParser::new(&[0x07, 0x00])
            .parse_method_spec_signature()
            .is_err());
    }

    #[test]
    fn invalid_inputs() {
        assert!(SignatureParser::new(&[0x07, 0x08])
            .parse_field_signature()
            .is_err());
        assert!(SignatureParser::new(&[0x00, 0x01])
            .parse_method_signature()
            .is_err());

        let deep = [vec![0x0F; 60], vec![0x08]].concat();
        assert!(matches!(
            SignatureParser::new(&deep).parse_type_spec(),
            Err(RecursionLimit(_))
        ));
    }
}
