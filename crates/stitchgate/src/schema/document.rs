// Minimal SDL document model
//
// The composition layer only needs enough schema structure to stitch
// fragments (type-name collision detection) and to diff two composed graphs
// (type / field / member level). Full type-system semantics are the
// execution layer's concern, so fields keep their type as rendered text.

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised while parsing a single schema document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
	#[error("schema parse error: {0}")]
	Parse(String),

	#[error("duplicate type definition '{0}'")]
	DuplicateType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
	Object,
	Interface,
	InputObject,
	Enum,
	Union,
	Scalar,
}

impl std::fmt::Display for TypeKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			TypeKind::Object => "type",
			TypeKind::Interface => "interface",
			TypeKind::InputObject => "input",
			TypeKind::Enum => "enum",
			TypeKind::Union => "union",
			TypeKind::Scalar => "scalar",
		};
		f.write_str(name)
	}
}

/// One named type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
	pub name: String,
	pub kind: TypeKind,
	/// Field name -> rendered field type (object-like kinds)
	pub fields: IndexMap<String, String>,
	/// Enum values or union members
	pub members: Vec<String>,
}

impl TypeDefinition {
	fn new(name: String, kind: TypeKind) -> Self {
		Self {
			name,
			kind,
			fields: IndexMap::new(),
			members: Vec::new(),
		}
	}
}

/// An ordered collection of named type definitions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDocument {
	pub types: IndexMap<String, TypeDefinition>,
}

impl SchemaDocument {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}

	pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
		self.types.get(name)
	}

	/// Parse one SDL document
	pub fn parse(source: &str) -> Result<Self, DocumentError> {
		let tokens = tokenize(source)?;
		Parser::new(tokens).parse_document()
	}

	/// Add a type, rejecting duplicates within the same document set
	pub fn insert(&mut self, definition: TypeDefinition) -> Result<(), DocumentError> {
		if self.types.contains_key(&definition.name) {
			return Err(DocumentError::DuplicateType(definition.name));
		}
		self.types.insert(definition.name.clone(), definition);
		Ok(())
	}

	/// Fold another document into this one, rejecting duplicate type names.
	/// Used to combine one service's own named documents.
	pub fn extend_from(&mut self, other: SchemaDocument) -> Result<(), DocumentError> {
		for (_, definition) in other.types {
			self.insert(definition)?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	Name(String),
	Punct(char),
}

impl Token {
	fn describe(&self) -> String {
		match self {
			Token::Name(name) => format!("'{}'", name),
			Token::Punct(c) => format!("'{}'", c),
		}
	}
}

fn tokenize(source: &str) -> Result<Vec<Token>, DocumentError> {
	let mut tokens = Vec::new();
	let mut chars = source.chars().peekable();

	while let Some(&c) = chars.peek() {
		match c {
			// Commas are insignificant separators in SDL
			c if c.is_whitespace() || c == ',' => {
				chars.next();
			},
			'#' => {
				for c in chars.by_ref() {
					if c == '\n' {
						break;
					}
				}
			},
			'"' => {
				skip_string(&mut chars)?;
			},
			// Numbers only appear inside argument defaults, which are
			// skipped wholesale, so they are lexed as opaque names
			c if c.is_ascii_digit() || c == '-' => {
				let mut literal = String::new();
				literal.push(c);
				chars.next();
				while let Some(&c) = chars.peek() {
					if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-') {
						literal.push(c);
						chars.next();
					} else {
						break;
					}
				}
				tokens.push(Token::Name(literal));
			},
			c if c.is_ascii_alphabetic() || c == '_' => {
				let mut name = String::new();
				while let Some(&c) = chars.peek() {
					if c.is_ascii_alphanumeric() || c == '_' {
						name.push(c);
						chars.next();
					} else {
						break;
					}
				}
				tokens.push(Token::Name(name));
			},
			'{' | '}' | '(' | ')' | '[' | ']' | ':' | '=' | '|' | '!' | '&' | '@' => {
				tokens.push(Token::Punct(c));
				chars.next();
			},
			other => {
				return Err(DocumentError::Parse(format!(
					"unexpected character '{}'",
					other
				)));
			},
		}
	}

	Ok(tokens)
}

/// Skip a string or block-string literal (descriptions and default values)
fn skip_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<(), DocumentError> {
	// Caller saw a leading quote
	chars.next();
	if chars.peek() == Some(&'"') {
		chars.next();
		if chars.peek() == Some(&'"') {
			// Block string: consume until the closing triple quote
			chars.next();
			let mut quotes = 0;
			for c in chars.by_ref() {
				if c == '"' {
					quotes += 1;
					if quotes == 3 {
						return Ok(());
					}
				} else {
					quotes = 0;
				}
			}
			return Err(DocumentError::Parse("unterminated block string".into()));
		}
		// Empty string
		return Ok(());
	}

	let mut escaped = false;
	for c in chars.by_ref() {
		if escaped {
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == '"' {
			return Ok(());
		}
	}
	Err(DocumentError::Parse("unterminated string".into()))
}

struct Parser {
	tokens: Vec<Token>,
	pos: usize,
}

impl Parser {
	fn new(tokens: Vec<Token>) -> Self {
		Self { tokens, pos: 0 }
	}

	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos)
	}

	fn next(&mut self) -> Option<Token> {
		let token = self.tokens.get(self.pos).cloned();
		if token.is_some() {
			self.pos += 1;
		}
		token
	}

	fn expect_name(&mut self) -> Result<String, DocumentError> {
		match self.next() {
			Some(Token::Name(name)) => Ok(name),
			Some(other) => Err(DocumentError::Parse(format!(
				"expected a name, found {}",
				other.describe()
			))),
			None => Err(DocumentError::Parse("unexpected end of document".into())),
		}
	}

	fn expect_punct(&mut self, expected: char) -> Result<(), DocumentError> {
		match self.next() {
			Some(Token::Punct(c)) if c == expected => Ok(()),
			Some(other) => Err(DocumentError::Parse(format!(
				"expected '{}', found {}",
				expected,
				other.describe()
			))),
			None => Err(DocumentError::Parse(format!(
				"expected '{}', found end of document",
				expected
			))),
		}
	}

	fn eat_punct(&mut self, expected: char) -> bool {
		if matches!(self.peek(), Some(Token::Punct(c)) if *c == expected) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn parse_document(mut self) -> Result<SchemaDocument, DocumentError> {
		let mut document = SchemaDocument::new();

		while let Some(token) = self.peek() {
			let keyword = match token {
				Token::Name(name) => name.clone(),
				other => {
					return Err(DocumentError::Parse(format!(
						"expected a definition, found {}",
						other.describe()
					)));
				},
			};
			self.pos += 1;

			match keyword.as_str() {
				"schema" => {
					self.skip_directives()?;
					self.expect_punct('{')?;
					self.skip_braced()?;
				},
				"scalar" => {
					let name = self.expect_name()?;
					self.skip_directives()?;
					document.insert(TypeDefinition::new(name, TypeKind::Scalar))?;
				},
				"type" => {
					let definition = self.parse_object_like(TypeKind::Object)?;
					document.insert(definition)?;
				},
				"interface" => {
					let definition = self.parse_object_like(TypeKind::Interface)?;
					document.insert(definition)?;
				},
				"input" => {
					let definition = self.parse_object_like(TypeKind::InputObject)?;
					document.insert(definition)?;
				},
				"enum" => {
					let definition = self.parse_enum()?;
					document.insert(definition)?;
				},
				"union" => {
					let definition = self.parse_union()?;
					document.insert(definition)?;
				},
				"directive" => {
					self.skip_directive_definition()?;
				},
				"extend" => {
					let extension = self.parse_extension()?;
					merge_extension(&mut document, extension)?;
				},
				other => {
					return Err(DocumentError::Parse(format!(
						"unexpected definition keyword '{}'",
						other
					)));
				},
			}
		}

		Ok(document)
	}

	fn parse_object_like(&mut self, kind: TypeKind) -> Result<TypeDefinition, DocumentError> {
		let name = self.expect_name()?;
		let mut definition = TypeDefinition::new(name, kind);

		if matches!(self.peek(), Some(Token::Name(n)) if n == "implements") {
			self.pos += 1;
			self.eat_punct('&');
			self.expect_name()?;
			while self.eat_punct('&') {
				self.expect_name()?;
			}
		}
		self.skip_directives()?;

		self.expect_punct('{')?;
		loop {
			match self.peek() {
				Some(Token::Punct('}')) => {
					self.pos += 1;
					break;
				},
				Some(Token::Name(_)) => {
					let field = self.expect_name()?;
					if self.eat_punct('(') {
						self.skip_parenthesized()?;
					}
					self.expect_punct(':')?;
					let field_type = self.parse_type_ref()?;
					self.skip_directives()?;
					definition.fields.insert(field, field_type);
				},
				Some(other) => {
					return Err(DocumentError::Parse(format!(
						"expected a field, found {}",
						other.describe()
					)));
				},
				None => {
					return Err(DocumentError::Parse(format!(
						"unterminated body for type '{}'",
						definition.name
					)));
				},
			}
		}

		Ok(definition)
	}

	fn parse_enum(&mut self) -> Result<TypeDefinition, DocumentError> {
		let name = self.expect_name()?;
		let mut definition = TypeDefinition::new(name, TypeKind::Enum);
		self.skip_directives()?;
		self.expect_punct('{')?;
		loop {
			match self.next() {
				Some(Token::Punct('}')) => break,
				Some(Token::Name(value)) => {
					self.skip_directives()?;
					definition.members.push(value);
				},
				Some(other) => {
					return Err(DocumentError::Parse(format!(
						"expected an enum value, found {}",
						other.describe()
					)));
				},
				None => {
					return Err(DocumentError::Parse(format!(
						"unterminated body for enum '{}'",
						definition.name
					)));
				},
			}
		}
		Ok(definition)
	}

	fn parse_union(&mut self) -> Result<TypeDefinition, DocumentError> {
		let name = self.expect_name()?;
		let mut definition = TypeDefinition::new(name, TypeKind::Union);
		self.skip_directives()?;
		self.expect_punct('=')?;
		self.eat_punct('|');
		definition.members.push(self.expect_name()?);
		while self.eat_punct('|') {
			definition.members.push(self.expect_name()?);
		}
		Ok(definition)
	}

	/// `directive @name(args) on LOCATION | LOCATION`
	fn skip_directive_definition(&mut self) -> Result<(), DocumentError> {
		self.expect_punct('@')?;
		self.expect_name()?;
		if self.eat_punct('(') {
			self.skip_parenthesized()?;
		}
		if matches!(self.peek(), Some(Token::Name(n)) if n == "repeatable") {
			self.pos += 1;
		}
		match self.next() {
			Some(Token::Name(n)) if n == "on" => {},
			_ => return Err(DocumentError::Parse("malformed directive definition".into())),
		}
		self.eat_punct('|');
		self.expect_name()?;
		while self.eat_punct('|') {
			self.expect_name()?;
		}
		Ok(())
	}

	fn parse_extension(&mut self) -> Result<TypeDefinition, DocumentError> {
		let keyword = self.expect_name()?;
		match keyword.as_str() {
			"type" => self.parse_object_like(TypeKind::Object),
			"interface" => self.parse_object_like(TypeKind::Interface),
			"input" => self.parse_object_like(TypeKind::InputObject),
			"enum" => self.parse_enum(),
			"union" => self.parse_union(),
			other => Err(DocumentError::Parse(format!(
				"unsupported extension '{}'",
				other
			))),
		}
	}

	/// `Type := Name | [Type]` with an optional `!` suffix
	fn parse_type_ref(&mut self) -> Result<String, DocumentError> {
		let mut rendered = String::new();
		match self.next() {
			Some(Token::Punct('[')) => {
				rendered.push('[');
				rendered.push_str(&self.parse_type_ref()?);
				self.expect_punct(']')?;
				rendered.push(']');
			},
			Some(Token::Name(name)) => rendered.push_str(&name),
			Some(other) => {
				return Err(DocumentError::Parse(format!(
					"expected a type, found {}",
					other.describe()
				)));
			},
			None => return Err(DocumentError::Parse("expected a type".into())),
		}
		if self.eat_punct('!') {
			rendered.push('!');
		}
		Ok(rendered)
	}

	/// Skip `@name` or `@name(args)` sequences
	fn skip_directives(&mut self) -> Result<(), DocumentError> {
		while self.eat_punct('@') {
			self.expect_name()?;
			if self.eat_punct('(') {
				self.skip_parenthesized()?;
			}
		}
		Ok(())
	}

	/// Skip balanced parentheses; the opening one is already consumed
	fn skip_parenthesized(&mut self) -> Result<(), DocumentError> {
		let mut depth = 1;
		while depth > 0 {
			match self.next() {
				Some(Token::Punct('(')) => depth += 1,
				Some(Token::Punct(')')) => depth -= 1,
				Some(_) => {},
				None => return Err(DocumentError::Parse("unbalanced parentheses".into())),
			}
		}
		Ok(())
	}

	/// Skip balanced braces; the opening one is already consumed
	fn skip_braced(&mut self) -> Result<(), DocumentError> {
		let mut depth = 1;
		while depth > 0 {
			match self.next() {
				Some(Token::Punct('{')) => depth += 1,
				Some(Token::Punct('}')) => depth -= 1,
				Some(_) => {},
				None => return Err(DocumentError::Parse("unbalanced braces".into())),
			}
		}
		Ok(())
	}
}

/// Fold an `extend` block into the document; unknown targets become new types
fn merge_extension(
	document: &mut SchemaDocument,
	extension: TypeDefinition,
) -> Result<(), DocumentError> {
	match document.types.get_mut(&extension.name) {
		Some(existing) => {
			if existing.kind != extension.kind {
				return Err(DocumentError::Parse(format!(
					"extension of '{}' does not match its kind",
					extension.name
				)));
			}
			for (field, field_type) in extension.fields {
				existing.fields.insert(field, field_type);
			}
			existing.members.extend(extension.members);
			Ok(())
		},
		None => document.insert(extension),
	}
}
