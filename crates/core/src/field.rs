use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label shown for a column that carries no semantic field.
pub const UNMAPPED: &str = "–";

/// A semantic transaction attribute that a column can be mapped onto.
///
/// The declaration order is the detection order: when a header matches more than one
/// pattern, the field declared first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Description,
    Income,
    Expenses,
    Category,
    Subcategory,
    Balance,
    Currency,
    Reference,
    Notes,
    Account,
    Payee,
    CheckNumber,
    TransactionId,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Date,
        Field::Description,
        Field::Income,
        Field::Expenses,
        Field::Category,
        Field::Subcategory,
        Field::Balance,
        Field::Currency,
        Field::Reference,
        Field::Notes,
        Field::Account,
        Field::Payee,
        Field::CheckNumber,
        Field::TransactionId,
    ];

    pub const MONETARY: [Field; 3] = [Field::Income, Field::Expenses, Field::Balance];

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn schema(self) -> &'static FieldSchema {
        // SCHEMA is declared in the same order as the enum.
        &SCHEMA[self as usize]
    }

    pub fn is_required(self) -> bool {
        self.schema().required
    }

    pub fn is_monetary(self) -> bool {
        self.schema().monetary
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown field: '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    /// Accepts display names ("Check Number") as well as snake_case keys ("check_number").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(*c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        Field::ALL
            .into_iter()
            .find(|field| {
                field
                    .name()
                    .chars()
                    .filter(|c| *c != ' ')
                    .flat_map(char::to_lowercase)
                    .eq(wanted.chars())
            })
            .ok_or_else(|| UnknownField(s.trim().to_string()))
    }
}

/// Static description of one recognised field.
#[derive(Debug)]
pub struct FieldSchema {
    pub field: Field,
    pub name: &'static str,
    /// Case-insensitive pattern matched anywhere in the header text.
    pub pattern: &'static str,
    pub required: bool,
    pub monetary: bool,
}

macro_rules! schema {
    ($field:ident, $name:expr, $pat:expr, required = $req:expr, monetary = $mon:expr) => {
        FieldSchema {
            field: Field::$field,
            name: $name,
            pattern: $pat,
            required: $req,
            monetary: $mon,
        }
    };
}

pub static SCHEMA: [FieldSchema; 14] = [
    schema!(Date, "Date",
        r"date|datum|fecha|\bdata\b|\bdato\b|tarih|дата|日期|日付|날짜|تاريخ|תאריך",
        required = true, monetary = false),
    schema!(Description, "Description",
        r"descri|beschreibung|verwendungszweck|buchungstext|libell[eé]|concepto|omschrijving|\bopis\b|описание|назначение|描述|摘要|説明|details?|narrative|particulars",
        required = false, monetary = false),
    schema!(Income, "Income",
        r"income|credit|deposit|inflow|money\s*in\b|paid\s*in\b|einnahme|eingang|gutschrift|\bhaben\b|ingreso|abono|cr[ée]dit|recette|entrat|entrada|inkomst|приход|поступлени|доход|收入|入金|収入",
        required = false, monetary = true),
    schema!(Expenses, "Expenses",
        r"expense|debit|withdraw|outflow|money\s*out\b|paid\s*out\b|ausgabe|lastschrift|belastung|\bsoll\b|gasto|cargo|d[ée]bit|d[ée]pense|uscit|sa[ií]da|uitgave|расход|списани|支出|出金|支払",
        required = false, monetary = true),
    // Anchored with a closed list of qualifiers so that "Subcategory", "Unterkategorie"
    // or "Подкатегория" fall through.
    schema!(Category, "Category",
        r"^\s*(?:(?:main|parent|primary|top[\s_-]*level|transaction|budget|spending|merchant|haupt|ober)[\s_-]*)?(?:categor|kategor|cat[ée]gor|категор|类别|分类|類別|カテゴリ|大分類|分類)",
        required = false, monetary = false),
    schema!(Subcategory, "Subcategory",
        r"sub[\s_-]*categor|unterkategor|sous[\s_-]*cat[ée]gor|sottocategor|subcateg|подкатегор|子类别|子分类|子類別|サブカテゴリ|中分類|小分類",
        required = false, monetary = false),
    schema!(Balance, "Balance",
        r"balance|saldo|solde|kontostand|остаток|баланс|余额|餘額|残高|잔액",
        required = false, monetary = true),
    schema!(Currency, "Currency",
        r"currency|\bccy\b|\bcur\b|w[äa]hrung|moneda|divisa|devise|valuta|moeda|валюта|货币|貨幣|币种|通貨",
        required = false, monetary = false),
    schema!(Reference, "Reference",
        r"reference|\bref\b|referenz|referencia|r[ée]f[ée]rence|riferimento|refer[êe]ncia|kenmerk|ссылка|参考|参照",
        required = false, monetary = false),
    schema!(Notes, "Notes",
        r"note|memo|comment|remark|bemerkung|notiz|anmerkung|\bnotas?\b|observaci|remarque|opmerking|примечани|комментари|заметк|备注|備註|メモ|備考",
        required = false, monetary = false),
    schema!(Account, "Account",
        r"account|\bacct\b|konto|cuenta|compte|\bconto\b|\bconta\b|rekening|сч[её]т|账户|帐户|賬戶|口座",
        required = false, monetary = false),
    schema!(Payee, "Payee",
        r"payee|beneficiar|recipient|counterparty|merchant|empf[äa]nger|destinatario|b[ée]n[ée]ficiaire|favorecido|получател|收款人|受取人|支払先",
        required = false, monetary = false),
    schema!(CheckNumber, "Check Number",
        r"\bcheck\b|cheque|scheck|ch[èe]que|assegno|\bчек|支票|小切手",
        required = false, monetary = false),
    schema!(TransactionId, "Transaction ID",
        r"transaction\s*id|txn\s*id|trans\s*id|\bid\b|identifier|identifiant|transaktions[\s-]*id|идентификатор|交易\s*id|交易号|流水号|取引\s*id",
        required = false, monetary = false),
];

fn compiled_schema() -> &'static [(Field, Regex)] {
    static COMPILED: OnceLock<Vec<(Field, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        SCHEMA
            .iter()
            .map(|entry| {
                let re = Regex::new(&format!("(?i){}", entry.pattern)).expect("invalid regex");
                (entry.field, re)
            })
            .collect()
    })
}

/// First field, in enumeration order, whose pattern matches the header text.
pub fn match_header(header: &str) -> Option<Field> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }
    compiled_schema()
        .iter()
        .find(|(_, re)| re.is_match(header))
        .map(|(field, _)| *field)
}
