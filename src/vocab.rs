//! IRIs of the vocabularies the core reads

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub mod tree {
    pub const NS: &str = "https://w3id.org/tree#";

    pub fn iri(local: &str) -> String {
        format!("{}{}", NS, local)
    }

    pub const RELATION: &str = "https://w3id.org/tree#relation";
    pub const NODE: &str = "https://w3id.org/tree#node";
    pub const VALUE: &str = "https://w3id.org/tree#value";
    pub const PATH: &str = "https://w3id.org/tree#path";
    pub const VIEW: &str = "https://w3id.org/tree#view";
    pub const MEMBER: &str = "https://w3id.org/tree#member";
}

pub mod xsd {
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

    /// Numeric datatypes whose lexical forms parse as numbers
    pub const NUMERIC: &[&str] = &[
        "http://www.w3.org/2001/XMLSchema#integer",
        "http://www.w3.org/2001/XMLSchema#decimal",
        "http://www.w3.org/2001/XMLSchema#double",
        "http://www.w3.org/2001/XMLSchema#float",
        "http://www.w3.org/2001/XMLSchema#long",
        "http://www.w3.org/2001/XMLSchema#int",
        "http://www.w3.org/2001/XMLSchema#short",
        "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
        "http://www.w3.org/2001/XMLSchema#positiveInteger",
        "http://www.w3.org/2001/XMLSchema#unsignedLong",
        "http://www.w3.org/2001/XMLSchema#unsignedInt",
    ];
}
