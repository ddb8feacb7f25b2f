//! Grammatical category descriptors and their combinations.
//!
//! A [`Data`] entry is one closed-world descriptor ("sustantivo", "femenino",
//! "de lugar"…) with derivable inflected forms. A [`Catgram`] combines a noun-like
//! head with one or two qualifiers, agreeing in gender and number:
//! `NOUN + FEMININE` → "sustantivo femenino" / "sustantivos femeninos".

use std::fmt;

use crate::error::{EditorError, EditorResult};

/// Grammatical behaviour of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    MasculineNoun,
    FeminineNoun,
    Qualifier,
    InvariantQualifier,
    Compound,
}

/// Static record behind a [`Data`] entry. Unset forms fall back to the
/// derivation rules in the [`Data`] accessors.
#[derive(Debug, Clone, Copy)]
struct Props {
    kind: Kind,
    singular: &'static str,
    plural: Option<&'static str>,
    masc_singular_adj: Option<&'static str>,
    fem_singular_adj: Option<&'static str>,
    masc_plural_adj: Option<&'static str>,
    fem_plural_adj: Option<&'static str>,
    compound_terms: Option<[Data; 2]>,
    redirects: &'static [&'static str],
}

impl Props {
    const fn new(kind: Kind, singular: &'static str) -> Self {
        Props {
            kind,
            singular,
            plural: None,
            masc_singular_adj: None,
            fem_singular_adj: None,
            masc_plural_adj: None,
            fem_plural_adj: None,
            compound_terms: None,
            redirects: &[],
        }
    }

    const fn masc(singular: &'static str) -> Self {
        Props::new(Kind::MasculineNoun, singular)
    }

    const fn fem(singular: &'static str) -> Self {
        Props::new(Kind::FeminineNoun, singular)
    }

    const fn qualifier(masculine: &'static str, feminine: &'static str) -> Self {
        Props::new(Kind::Qualifier, masculine).f_sg(feminine)
    }

    const fn epicene(singular: &'static str) -> Self {
        Props::new(Kind::Qualifier, singular)
    }

    const fn invariant(singular: &'static str) -> Self {
        Props::new(Kind::InvariantQualifier, singular)
    }

    const fn compound(first: Data, second: Data) -> Self {
        let mut props = Props::new(Kind::Compound, "");
        props.compound_terms = Some([first, second]);
        props
    }

    const fn pl(mut self, plural: &'static str) -> Self {
        self.plural = Some(plural);
        self
    }

    const fn m_sg(mut self, adj: &'static str) -> Self {
        self.masc_singular_adj = Some(adj);
        self
    }

    const fn f_sg(mut self, adj: &'static str) -> Self {
        self.fem_singular_adj = Some(adj);
        self
    }

    const fn m_pl(mut self, adj: &'static str) -> Self {
        self.masc_plural_adj = Some(adj);
        self
    }

    const fn f_pl(mut self, adj: &'static str) -> Self {
        self.fem_plural_adj = Some(adj);
        self
    }

    const fn redirects(mut self, redirects: &'static [&'static str]) -> Self {
        self.redirects = redirects;
        self
    }
}

/// A grammatical descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Data {
    Abbreviation,
    Adjective,
    NumeralAdjective,
    PossessiveAdjective,
    Adverb,
    Affix,
    Ambiguous,
    Animate,
    Article,
    Auxiliary,
    Cardinal,
    Collective,
    Comparative,
    Common,
    Conjunction,
    Copulative,
    OfAblative,
    OfAccusative,
    OfAccusativeOrAblative,
    OfAffirmation,
    OfQuantity,
    OfDative,
    OfDoubt,
    OfGenitive,
    OfIndicative,
    OfPlace,
    OfMood,
    OfNegation,
    OfSequence,
    OfTime,
    Defective,
    Demonstrative,
    Determinate,
    Dual,
    Digraph,
    Exclamative,
    Feminine,
    VerbForm,
    Imperfective,
    Impersonal,
    Inanimate,
    Indeclinable,
    Indefinite,
    Indeterminate,
    Infix,
    Initialism,
    Interjection,
    Interrogative,
    Intransitive,
    Letter,
    Phrase,
    Masculine,
    Modal,
    Neuter,
    Numeral,
    Ordinal,
    Particle,
    Personal,
    Plural,
    Possessive,
    Postposition,
    Prefix,
    Preposition,
    Pronoun,
    PossessivePronoun,
    Proper,
    Proverb,
    Relative,
    Acronym,
    Singular,
    Suffix,
    FlexiveSuffix,
    Noun,
    ProperNoun,
    Transitive,
    Verb,
}

impl Data {
    pub const ALL: [Data; 76] = [
        Data::Abbreviation,
        Data::Adjective,
        Data::NumeralAdjective,
        Data::PossessiveAdjective,
        Data::Adverb,
        Data::Affix,
        Data::Ambiguous,
        Data::Animate,
        Data::Article,
        Data::Auxiliary,
        Data::Cardinal,
        Data::Collective,
        Data::Comparative,
        Data::Common,
        Data::Conjunction,
        Data::Copulative,
        Data::OfAblative,
        Data::OfAccusative,
        Data::OfAccusativeOrAblative,
        Data::OfAffirmation,
        Data::OfQuantity,
        Data::OfDative,
        Data::OfDoubt,
        Data::OfGenitive,
        Data::OfIndicative,
        Data::OfPlace,
        Data::OfMood,
        Data::OfNegation,
        Data::OfSequence,
        Data::OfTime,
        Data::Defective,
        Data::Demonstrative,
        Data::Determinate,
        Data::Dual,
        Data::Digraph,
        Data::Exclamative,
        Data::Feminine,
        Data::VerbForm,
        Data::Imperfective,
        Data::Impersonal,
        Data::Inanimate,
        Data::Indeclinable,
        Data::Indefinite,
        Data::Indeterminate,
        Data::Infix,
        Data::Initialism,
        Data::Interjection,
        Data::Interrogative,
        Data::Intransitive,
        Data::Letter,
        Data::Phrase,
        Data::Masculine,
        Data::Modal,
        Data::Neuter,
        Data::Numeral,
        Data::Ordinal,
        Data::Particle,
        Data::Personal,
        Data::Plural,
        Data::Possessive,
        Data::Postposition,
        Data::Prefix,
        Data::Preposition,
        Data::Pronoun,
        Data::PossessivePronoun,
        Data::Proper,
        Data::Proverb,
        Data::Relative,
        Data::Acronym,
        Data::Singular,
        Data::Suffix,
        Data::FlexiveSuffix,
        Data::Noun,
        Data::ProperNoun,
        Data::Transitive,
        Data::Verb,
    ];

    fn props(self) -> Props {
        match self {
            Data::Abbreviation => Props::fem("abreviatura").m_sg("de abreviatura"),
            Data::Adjective => Props::masc("adjetivo").f_sg("adjetiva").redirects(&["adjetivos"]),
            Data::NumeralAdjective => Props::compound(Data::Adjective, Data::Numeral),
            Data::PossessiveAdjective => Props::compound(Data::Adjective, Data::Possessive),
            Data::Adverb => Props::masc("adverbio")
                .m_sg("adverbial")
                .m_pl("adverbiales")
                .redirects(&["adverbios"]),
            Data::Affix => Props::masc("afijo").f_sg("afija"),
            Data::Ambiguous => Props::qualifier("ambiguo", "ambigua"),
            Data::Animate => Props::qualifier("animado", "animada"),
            Data::Article => Props::masc("artículo")
                .m_sg("de artículo")
                .redirects(&["artículos", "articulos", "articulo"]),
            Data::Auxiliary => Props::epicene("auxiliar").pl("auxiliares"),
            Data::Cardinal => Props::epicene("cardinal").pl("cardinales"),
            Data::Collective => Props::qualifier("colectivo", "colectiva"),
            Data::Comparative => Props::qualifier("comparativo", "comparativa"),
            Data::Common => Props::epicene("común").pl("comunes"),
            Data::Conjunction => Props::fem("conjunción")
                .pl("conjunciones")
                .m_sg("conjuntivo")
                .f_sg("conjuntiva"),
            Data::Copulative => Props::qualifier("copulativo", "copulativa"),
            Data::OfAblative => Props::invariant("de ablativo"),
            Data::OfAccusative => Props::invariant("de acusativo"),
            Data::OfAccusativeOrAblative => Props::invariant("de acusativo o ablativo"),
            Data::OfAffirmation => Props::invariant("de afirmación"),
            Data::OfQuantity => Props::invariant("de cantidad"),
            Data::OfDative => Props::invariant("de dativo"),
            Data::OfDoubt => Props::invariant("de duda"),
            Data::OfGenitive => Props::invariant("de genitivo"),
            Data::OfIndicative => Props::invariant("de indicativo"),
            Data::OfPlace => Props::invariant("de lugar"),
            Data::OfMood => Props::invariant("de modo"),
            Data::OfNegation => Props::invariant("de negación"),
            Data::OfSequence => Props::invariant("de orden"),
            Data::OfTime => Props::invariant("de tiempo"),
            Data::Defective => Props::qualifier("defectivo", "defectiva"),
            Data::Demonstrative => Props::qualifier("demostrativo", "demostrativa"),
            Data::Determinate => Props::qualifier("determinado", "determinada"),
            Data::Dual => Props::epicene("dual").pl("duales"),
            Data::Digraph => Props::masc("dígrafo").m_sg("de dígrafo"),
            Data::Exclamative => Props::qualifier("exclamativo", "exclamativa"),
            Data::Feminine => Props::qualifier("femenino", "femenina"),
            Data::VerbForm => Props::fem("forma verbal")
                .pl("formas verbales")
                .m_sg("de forma verbal")
                .m_pl("de formas verbales"),
            Data::Imperfective => Props::qualifier("imperfectivo", "imperfectiva"),
            Data::Impersonal => Props::epicene("impersonal").pl("impersonales"),
            Data::Inanimate => Props::qualifier("inanimado", "inanimada"),
            Data::Indeclinable => Props::epicene("indeclinable"),
            Data::Indefinite => Props::qualifier("indefinido", "indefinida"),
            Data::Indeterminate => Props::qualifier("indeterminado", "indeterminada"),
            Data::Infix => Props::masc("infijo").f_sg("infija"),
            Data::Initialism => Props::masc("inicialismo").m_sg("de inicialismo"),
            Data::Interjection => Props::fem("interjección")
                .pl("interjecciones")
                .m_sg("interjectivo")
                .f_sg("interjectiva"),
            Data::Interrogative => Props::qualifier("interrogativo", "interrogativa"),
            Data::Intransitive => Props::qualifier("intransitivo", "intransitiva"),
            Data::Letter => Props::fem("letra").m_sg("de letra"),
            Data::Phrase => Props::fem("locución")
                .pl("locuciones")
                .m_sg("locutivo")
                .f_sg("locutiva"),
            Data::Masculine => Props::qualifier("masculino", "masculina"),
            Data::Modal => Props::epicene("modal").pl("modales"),
            Data::Neuter => Props::qualifier("neutro", "neutra"),
            Data::Numeral => Props::masc("numeral").pl("numerales"),
            Data::Ordinal => Props::epicene("ordinal").pl("ordinales"),
            Data::Particle => Props::fem("partícula")
                .m_sg("de partícula")
                .m_pl("de partículas"),
            Data::Personal => Props::epicene("personal").pl("personales"),
            Data::Plural => Props::epicene("plural").pl("plurales"),
            Data::Possessive => Props::qualifier("posesivo", "posesiva").redirects(&["posesivos"]),
            Data::Postposition => Props::fem("postposición")
                .pl("postposiciones")
                .m_sg("postpositivo")
                .f_sg("postpositiva"),
            Data::Prefix => Props::masc("prefijo").f_sg("prefija"),
            Data::Preposition => Props::fem("preposición")
                .pl("preposiciones")
                .m_sg("prepositivo")
                .f_sg("prepositiva")
                .redirects(&["preposicion", "preposiciones"]),
            Data::Pronoun => Props::masc("pronombre")
                .m_sg("pronominal")
                .m_pl("pronominales")
                .redirects(&["pronombres", "pronominal"]),
            Data::PossessivePronoun => Props::compound(Data::Pronoun, Data::Possessive),
            Data::Proper => Props::qualifier("propio", "propia"),
            Data::Proverb => Props::masc("refrán")
                .pl("refranes")
                .m_sg("de refrán")
                .m_pl("de refrán"),
            Data::Relative => Props::qualifier("relativo", "relativa"),
            Data::Acronym => Props::fem("sigla").m_sg("de sigla").m_pl("de siglas"),
            Data::Singular => Props::epicene("singular").pl("singulares"),
            Data::Suffix => Props::masc("sufijo").f_sg("sufija"),
            Data::FlexiveSuffix => Props::masc("sufijo flexivo")
                .pl("sufijos flexivos")
                .f_sg("sufija flexiva")
                .f_pl("sufijas flexivas"),
            Data::Noun => Props::masc("sustantivo").f_sg("sustantiva").redirects(&["sustantivos"]),
            Data::ProperNoun => Props::masc("sustantivo propio")
                .pl("sustantivos propios")
                .f_sg("sustantiva propia")
                .f_pl("sustantivas propias"),
            Data::Transitive => Props::qualifier("transitivo", "transitiva"),
            Data::Verb => Props::masc("verbo")
                .m_sg("verbal")
                .m_pl("verbales")
                .redirects(&["verbos"]),
        }
    }

    pub fn kind(self) -> Kind {
        self.props().kind
    }

    /// Member descriptors of a compound entry.
    pub fn compound_terms(self) -> Option<[Data; 2]> {
        self.props().compound_terms
    }

    pub fn redirects(self) -> &'static [&'static str] {
        self.props().redirects
    }

    fn join_compound(terms: [Data; 2], accessor: fn(Data) -> String) -> String {
        terms.iter().map(|d| accessor(*d)).collect::<Vec<_>>().join(" ")
    }

    pub fn singular(self) -> String {
        let props = self.props();
        match props.compound_terms {
            Some(terms) => Data::join_compound(terms, Data::singular),
            None => props.singular.to_string(),
        }
    }

    pub fn plural(self) -> String {
        let props = self.props();
        if let Some(terms) = props.compound_terms {
            return Data::join_compound(terms, Data::plural);
        }

        match (props.kind, props.plural) {
            (Kind::InvariantQualifier, _) => props.singular.to_string(),
            (_, Some(plural)) => plural.to_string(),
            (_, None) => format!("{}s", props.singular),
        }
    }

    pub fn masculine_singular_adjective(self) -> String {
        let props = self.props();
        if let Some(terms) = props.compound_terms {
            return Data::join_compound(terms, Data::masculine_singular_adjective);
        }

        match (props.kind, props.masc_singular_adj) {
            (Kind::InvariantQualifier, _) | (_, None) => props.singular.to_string(),
            (_, Some(adj)) => adj.to_string(),
        }
    }

    pub fn feminine_singular_adjective(self) -> String {
        let props = self.props();
        if let Some(terms) = props.compound_terms {
            return Data::join_compound(terms, Data::feminine_singular_adjective);
        }

        match (props.kind, props.fem_singular_adj) {
            (Kind::InvariantQualifier, _) => props.singular.to_string(),
            (_, Some(adj)) => adj.to_string(),
            (_, None) => self.masculine_singular_adjective(),
        }
    }

    pub fn masculine_plural_adjective(self) -> String {
        let props = self.props();
        if let Some(terms) = props.compound_terms {
            return Data::join_compound(terms, Data::masculine_plural_adjective);
        }

        match (props.kind, props.masc_plural_adj, props.masc_singular_adj) {
            (Kind::InvariantQualifier, _, _) => props.singular.to_string(),
            (_, Some(adj), _) => adj.to_string(),
            (_, None, Some(singular_adj)) => format!("{}s", singular_adj),
            (_, None, None) => self.plural(),
        }
    }

    pub fn feminine_plural_adjective(self) -> String {
        let props = self.props();
        if let Some(terms) = props.compound_terms {
            return Data::join_compound(terms, Data::feminine_plural_adjective);
        }

        match (props.kind, props.fem_plural_adj, props.fem_singular_adj) {
            (Kind::InvariantQualifier, _, _) => props.singular.to_string(),
            (_, Some(adj), _) => adj.to_string(),
            (_, None, Some(singular_adj)) => format!("{}s", singular_adj),
            (_, None, None) => self.masculine_plural_adjective(),
        }
    }

    /// True for nouns and compounds, which may head a [`Catgram`].
    pub fn is_head(self) -> bool {
        matches!(
            self.kind(),
            Kind::MasculineNoun | Kind::FeminineNoun | Kind::Compound
        )
    }

    fn is_masculine(self) -> bool {
        match self.compound_terms() {
            Some([first, _]) => first.kind() == Kind::MasculineNoun,
            None => self.kind() == Kind::MasculineNoun,
        }
    }

    /// Reverse lookup by singular surface form or one of its redirects.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::UnknownDescriptor` when nothing matches.
    pub fn query(singular: &str) -> EditorResult<Data> {
        Data::ALL
            .iter()
            .copied()
            .find(|d| d.singular() == singular || d.redirects().contains(&singular))
            .ok_or_else(|| EditorError::UnknownDescriptor(singular.to_string()))
    }

    /// Upper snake case identifier, as used in resource files (`NOUN`, `OF_PLACE`).
    pub fn name(self) -> String {
        let debug = format!("{:?}", self);
        let mut name = String::with_capacity(debug.len() + 4);
        for (i, c) in debug.chars().enumerate() {
            if c.is_uppercase() && i > 0 {
                name.push('_');
            }
            name.push(c.to_ascii_uppercase());
        }
        name
    }

    /// Parse an identifier produced by [`Data::name`].
    pub fn from_name(name: &str) -> EditorResult<Data> {
        let name = name.trim();
        Data::ALL
            .iter()
            .copied()
            .find(|d| d.name() == name)
            .ok_or_else(|| EditorError::UnknownDescriptor(name.to_string()))
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coordinating conjunction between the second and third member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    /// Surface form before `word`: "e" replaces "y" before an /i/ sound,
    /// "u" replaces "o" before an /o/ sound.
    pub fn before(self, word: &str) -> &'static str {
        let rest = word.strip_prefix('h').unwrap_or(word);
        let mut chars = rest.chars();
        let first = chars.next();
        let second = chars.next();

        match self {
            Conjunction::And => {
                let starts_with_i = matches!(first, Some('i') | Some('í'));
                let followed_by_vowel = second.is_some_and(|c| "aeiouáéíóú".contains(c));
                if starts_with_i && second.is_some() && !followed_by_vowel {
                    "e"
                } else {
                    "y"
                }
            }
            Conjunction::Or => {
                if matches!(first, Some('o') | Some('ó')) && second.is_some() {
                    "u"
                } else {
                    "o"
                }
            }
        }
    }
}

/// A head descriptor qualified by up to two further descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Catgram {
    first: Data,
    second: Option<Data>,
    third: Option<(Data, Conjunction)>,
}

impl Catgram {
    /// A bare head. Qualifiers cannot stand alone.
    pub fn single(first: Data) -> Option<Catgram> {
        first.is_head().then_some(Catgram {
            first,
            second: None,
            third: None,
        })
    }

    /// Head plus qualifier.
    ///
    /// # Returns
    ///
    /// `None` when `first` is a qualifier.
    pub fn make(first: Data, second: Data) -> Option<Catgram> {
        let mut catgram = Catgram::single(first)?;
        catgram.second = Some(second);
        Some(catgram)
    }

    /// Head plus two coordinated qualifiers ("pronombre personal y reflexivo").
    pub fn make_with_conjunction(
        first: Data,
        second: Data,
        third: Data,
        conjunction: Conjunction,
    ) -> Option<Catgram> {
        let mut catgram = Catgram::make(first, second)?;
        catgram.third = Some((third, conjunction));
        Some(catgram)
    }

    /// Build from surface forms.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::UnknownDescriptor` for an unknown surface form or
    /// when the head is a qualifier.
    pub fn parse(first: &str, second: &str) -> EditorResult<Catgram> {
        let head = Data::query(first)?;
        let qualifier = Data::query(second)?;
        Catgram::make(head, qualifier)
            .ok_or_else(|| EditorError::UnknownDescriptor(format!("{} {}", first, second)))
    }

    pub fn first(&self) -> Data {
        self.first
    }

    pub fn second(&self) -> Option<Data> {
        self.second
    }

    pub fn third(&self) -> Option<(Data, Conjunction)> {
        self.third
    }

    fn qualifier_form(&self, member: Data, plural: bool) -> String {
        match (self.first.is_masculine(), plural) {
            (true, false) => member.masculine_singular_adjective(),
            (false, false) => member.feminine_singular_adjective(),
            (true, true) => member.masculine_plural_adjective(),
            (false, true) => member.feminine_plural_adjective(),
        }
    }

    fn qualifier_string(&self, plural: bool) -> Option<String> {
        let second = self.second?;
        let mut out = self.qualifier_form(second, plural);

        if let Some((third, conjunction)) = self.third {
            let form = self.qualifier_form(third, plural);
            out.push(' ');
            out.push_str(conjunction.before(&form));
            out.push(' ');
            out.push_str(&form);
        }

        Some(out)
    }

    pub fn singular(&self) -> String {
        match self.qualifier_string(false) {
            Some(qualifier) => format!("{} {}", self.first.singular(), qualifier),
            None => self.first.singular(),
        }
    }

    pub fn plural(&self) -> String {
        match self.qualifier_string(true) {
            Some(qualifier) => format!("{} {}", self.first.plural(), qualifier),
            None => self.first.plural(),
        }
    }
}

impl fmt::Display for Catgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        if let Some(second) = self.second {
            write!(f, " {}", second)?;
            if let Some((third, conjunction)) = self.third {
                write!(f, " {:?} {}", conjunction, third)?;
            }
        }
        Ok(())
    }
}
