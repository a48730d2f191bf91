//! Cell formatting: fonts, number formats, alignment, borders, fills, and
//! the FONT/FORMAT/XF records those compile down to, plus a registry that
//! assigns indices and deduplicates repeated definitions.

use crate::buffer::OctetBuffer;
use crate::records;

/// One cell format, mirroring the attribute set Excel's XF/FONT records
/// carry. Constructed via [`FormatDesc::new`] then mutated with the
/// `set_*` builders before handing it to a [`FormatRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDesc {
    /// The cell XF index this format was assigned when added to a workbook
    /// (fixed at `Workbook::add_format` time); 0 until then.
    pub xf_index: u16,
    pub font_index: u16,
    pub fontname: String,
    pub size: u16,
    pub bold: u16,
    pub italic: bool,
    pub color: u16,
    pub underline: u8,
    pub font_strikeout: bool,
    pub font_outline: bool,
    pub font_shadow: bool,
    pub font_script: u16,
    pub font_family: u8,
    pub font_charset: u8,

    pub num_format_str: Option<String>,
    pub num_format: u16,

    pub text_h_align: u16,
    pub text_wrap: bool,
    pub text_v_align: u16,
    pub text_justlast: u16,
    pub rotation: u16,

    pub fg_color: u16,
    pub bg_color: u16,
    pub pattern: u16,

    pub bottom: u16,
    pub top: u16,
    pub left: u16,
    pub right: u16,
    pub bottom_color: u16,
    pub top_color: u16,
    pub left_color: u16,
    pub right_color: u16,
}

impl Default for FormatDesc {
    fn default() -> Self {
        FormatDesc {
            xf_index: 0,
            font_index: 0,
            fontname: "Arial".to_string(),
            size: 10,
            bold: 0x0190,
            italic: false,
            color: 0x7FFF,
            underline: 0,
            font_strikeout: false,
            font_outline: false,
            font_shadow: false,
            font_script: 0,
            font_family: 0,
            font_charset: 0,

            num_format_str: None,
            num_format: 0,

            text_h_align: 0,
            text_wrap: false,
            text_v_align: 2,
            text_justlast: 0,
            rotation: 0,

            fg_color: 0x40,
            bg_color: 0x41,
            pattern: 0,

            bottom: 0,
            top: 0,
            left: 0,
            right: 0,
            bottom_color: 0x40,
            top_color: 0x40,
            left_color: 0x40,
            right_color: 0x40,
        }
    }
}

impl FormatDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bold(&mut self, bold: bool) -> &mut Self {
        self.bold = if bold { 0x2BC } else { 0x190 };
        self
    }

    pub fn set_size(&mut self, size: u16) -> &mut Self {
        self.size = size;
        self
    }

    pub fn set_font(&mut self, font: impl Into<String>) -> &mut Self {
        self.fontname = font.into();
        self
    }

    pub fn set_italic(&mut self, italic: bool) -> &mut Self {
        self.italic = italic;
        self
    }

    pub fn set_underline(&mut self, val: u8) -> &mut Self {
        self.underline = val;
        self
    }

    /// Sets the font color by name from the fixed palette (`"red"`,
    /// `"navy"`, ...). Unknown names fall back to automatic (`0x7FFF`).
    pub fn set_color(&mut self, colorname: &str) -> &mut Self {
        self.color = named_color(colorname);
        self
    }

    /// Sets the font color by raw palette index. Values outside `8..=63`
    /// are clamped to automatic (`0x7FFF`) instead of being applied.
    pub fn set_colori(&mut self, colorval: u16) -> &mut Self {
        if !(8..=63).contains(&colorval) {
            self.color = 0x7FFF;
            return self;
        }
        self.color = colorval;
        self
    }

    pub fn set_bg_color(&mut self, colorname: &str) -> &mut Self {
        self.bg_color = named_color(colorname);
        self
    }

    pub fn set_fg_color(&mut self, colorname: &str) -> &mut Self {
        self.fg_color = named_color(colorname);
        self
    }

    pub fn set_border_color(&mut self, colorname: &str) -> &mut Self {
        let color = named_color(colorname);
        self.bottom_color = color;
        self.top_color = color;
        self.left_color = color;
        self.right_color = color;
        self
    }

    pub fn set_border(&mut self, style: u16) -> &mut Self {
        self.bottom = style;
        self.top = style;
        self.left = style;
        self.right = style;
        self
    }

    pub fn set_pattern(&mut self, pattern: u16) -> &mut Self {
        self.pattern = pattern;
        self
    }

    pub fn set_text_wrap(&mut self, val: bool) -> &mut Self {
        self.text_wrap = val;
        self
    }

    pub fn set_rotation(&mut self, val: u16) -> &mut Self {
        self.rotation = val;
        self
    }

    pub fn set_merge(&mut self) -> &mut Self {
        self.text_h_align = 6;
        self
    }

    /// Sets horizontal or vertical alignment by keyword (`"left"`,
    /// `"centre"`/`"center"`, `"right"`, `"fill"`, `"justify"`, `"merge"`
    /// for horizontal; `"top"`, `"vcentre"`/`"vcenter"`, `"bottom"`,
    /// `"vjustify"` for vertical). Unrecognized keywords are ignored.
    pub fn set_align(&mut self, align: &str) -> &mut Self {
        match align {
            "left" => self.text_h_align = 1,
            "centre" | "center" => self.text_h_align = 2,
            "right" => self.text_h_align = 3,
            "fill" => self.text_h_align = 4,
            "justify" => self.text_h_align = 5,
            "merge" => self.text_h_align = 6,
            "top" => self.text_v_align = 0,
            "vcentre" | "vcenter" => self.text_v_align = 1,
            "bottom" => self.text_v_align = 2,
            "vjustify" => self.text_v_align = 3,
            _ => {}
        }
        self
    }

    pub fn set_num_format(&mut self, format: u16) -> &mut Self {
        self.num_format = format;
        self
    }

    pub fn set_num_format_str(&mut self, s: impl Into<String>) -> &mut Self {
        self.num_format_str = Some(s.into());
        self
    }

    /// Additive hash over exactly the fields [`same_font`] compares, used
    /// only to narrow candidates before that structural-equality check —
    /// never as a standalone identity (the original source *did* use a hash
    /// as sole identity, which let colliding-but-distinct fonts silently
    /// merge). Deliberately excludes `num_format_str`: two descs that differ
    /// only in number format are still the same *font*, so folding the
    /// format string in here would make the hash disagree with
    /// [`same_font`] and defeat the accelerator (a hash used to narrow
    /// candidates for an equality check must agree with it — anything
    /// `same_font` calls equal has to hash equal too).
    fn accelerator_hash(&self) -> i64 {
        let mut hash: i64 = fhc(&self.fontname);
        hash += self.size as i64;
        hash += self.font_script as i64 + self.underline as i64;
        hash += self.font_strikeout as i64 + self.bold as i64 + self.font_outline as i64;
        hash += self.font_family as i64 + self.font_charset as i64;
        hash += self.font_shadow as i64 + self.color as i64 + self.italic as i64;
        hash
    }

    /// Builds the BIFF FONT record payload (header not included).
    fn font_payload(&self) -> OctetBuffer {
        let cch = self.fontname.len() as u8;
        let mut grbit: u8 = 0;
        if self.italic {
            grbit |= 0x02;
        }
        if self.font_strikeout {
            grbit |= 0x08;
        }
        if self.font_outline {
            grbit |= 0x10;
        }
        if self.font_shadow {
            grbit |= 0x20;
        }

        let mut p = OctetBuffer::with_capacity(15 + cch as usize);
        p.put_u16_le(self.size * 20);
        p.put_u16_le(grbit as u16);
        p.put_u16_le(self.color);
        p.put_u16_le(self.bold);
        p.put_u16_le(self.font_script);
        p.put_u8(self.underline);
        p.put_u8(self.font_family);
        p.put_u8(self.font_charset);
        p.put_u8(0x00);
        p.put_u8(cch);
        p.append(self.fontname.as_bytes());
        p
    }

    /// Builds the BIFF XF record payload (header not included). `style`
    /// carries the style-vs-cell bit plus parent-style index, per
    /// [`crate::records::XF`]'s documented layout.
    fn xf_payload(&self, style: u16) -> OctetBuffer {
        let atr_num = self.num_format != 0;
        let atr_fnt = self.font_index != 0;
        let atr_alc = self.text_wrap;
        let atr_bdr = self.bottom != 0 || self.top != 0 || self.left != 0 || self.right != 0;
        let atr_pat = self.fg_color != 0 || self.bg_color != 0 || self.pattern != 0;
        let atr_prot = false;

        // the original zeroes the border colour when that border's
        // style is unset; applied here too for byte-identical output
        let bottom_color = if self.bottom == 0 { 0 } else { self.bottom_color };
        let top_color = if self.top == 0 { 0 } else { self.top_color };
        let left_color = if self.left == 0 { 0 } else { self.left_color };
        let right_color = if self.right == 0 { 0 } else { self.right_color };

        let mut align: u16 = self.text_h_align;
        align |= self.text_wrap_bit() << 3;
        align |= self.text_v_align << 4;
        align |= self.text_justlast << 7;
        align |= self.rotation << 8;
        align |= (atr_num as u16) << 10;
        align |= (atr_fnt as u16) << 11;
        align |= (atr_alc as u16) << 12;
        align |= (atr_bdr as u16) << 13;
        align |= (atr_pat as u16) << 14;
        align |= (atr_prot as u16) << 15;

        let icv: u16 = self.fg_color | (self.bg_color << 7);

        let fill: u16 = self.pattern | (self.bottom << 6) | (bottom_color << 9);

        let border1: u16 = self.top | (self.left << 3) | (self.right << 6) | (top_color << 9);

        let border2: u16 = left_color | (right_color << 7);

        let mut p = OctetBuffer::with_capacity(16);
        p.put_u16_le(self.font_index);
        p.put_u16_le(self.num_format);
        p.put_u16_le(style);
        p.put_u16_le(align);
        p.put_u16_le(icv);
        p.put_u16_le(fill);
        p.put_u16_le(border1);
        p.put_u16_le(border2);
        p
    }

    fn text_wrap_bit(&self) -> u16 {
        self.text_wrap as u16
    }
}

/// Structural equality used for dedup, deliberately excluding `font_index`
/// and `num_format` (registry-assigned indices, not part of the format's
/// identity).
fn same_font(a: &FormatDesc, b: &FormatDesc) -> bool {
    a.fontname == b.fontname
        && a.size == b.size
        && a.bold == b.bold
        && a.italic == b.italic
        && a.color == b.color
        && a.underline == b.underline
        && a.font_strikeout == b.font_strikeout
        && a.font_outline == b.font_outline
        && a.font_shadow == b.font_shadow
        && a.font_script == b.font_script
        && a.font_family == b.font_family
        && a.font_charset == b.font_charset
}

fn fhc(s: &str) -> i64 {
    let mut hash: i64 = 0;
    for b in s.bytes() {
        hash = 31 * hash + b as i64;
    }
    hash
}

fn named_color(name: &str) -> u16 {
    match name {
        "aqua" => 0x0F,
        "black" => 0x08,
        "blue" => 0x0C,
        "fuchsia" => 0x0E,
        "gray" | "grey" => 0x17,
        "green" => 0x11,
        "lime" => 0x0B,
        "navy" => 0x12,
        "orange" => 0x1D,
        "purple" => 0x24,
        "red" => 0x0A,
        "silver" => 0x16,
        "white" => 0x09,
        "yellow" => 0x0D,
        _ => 0x7FFF,
    }
}

/// Resolves font and number-format indices for a workbook's formats at
/// close time, deduplicating fonts that compare equal under [`same_font`]
/// and number-format strings that are byte-identical, and emits the FONT,
/// FORMAT and XF records that go into the workbook globals substream.
///
/// Unlike `xf_index` (fixed the moment a format is added to a workbook),
/// `font_index`/`num_format` can't be resolved until every setter call on
/// every format has happened, since dedup compares final field values —
/// so resolution happens once, at `wbook_close`, over every format in
/// add-order.
#[derive(Default)]
pub struct FormatRegistry {
    /// Interned fonts, each paired with its `accelerator_hash()` so
    /// `intern_font` can reject most non-matches with a cheap integer
    /// comparison before falling back to the authoritative `same_font`
    /// structural check.
    fonts: Vec<(i64, FormatDesc)>,
    num_formats: Vec<String>,
}

/// The five built-in style XFs plus the blank default cell XF that Excel
/// expects at the head of the XF table, before any user format.
const BUILTIN_STYLE_XF_COUNT: usize = 15;
const FIRST_USER_FONT_INDEX: u16 = 6;
const FIRST_USER_NUM_FORMAT_INDEX: u16 = 164;

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and stashes `fmt.font_index` and `fmt.num_format` in place,
    /// interning the font and number-format string if this is the first
    /// format to use that exact combination.
    pub fn resolve(&mut self, fmt: &mut FormatDesc) {
        fmt.font_index = self.intern_font(fmt);
        if let Some(s) = fmt.num_format_str.clone() {
            fmt.num_format = self.intern_num_format(&s);
        }
    }

    fn intern_font(&mut self, desc: &FormatDesc) -> u16 {
        let hash = desc.accelerator_hash();
        if let Some(pos) = self.fonts.iter().position(|(h, f)| *h == hash && same_font(f, desc)) {
            log::debug!("format registry: reusing font at index {}", font_slot_to_index(pos));
            return font_slot_to_index(pos);
        }
        self.fonts.push((hash, desc.clone()));
        font_slot_to_index(self.fonts.len() - 1)
    }

    fn intern_num_format(&mut self, s: &str) -> u16 {
        if let Some(pos) = self.num_formats.iter().position(|f| f == s) {
            log::debug!("format registry: reusing number format at index {}", FIRST_USER_NUM_FORMAT_INDEX + pos as u16);
            return FIRST_USER_NUM_FORMAT_INDEX + pos as u16;
        }
        self.num_formats.push(s.to_string());
        FIRST_USER_NUM_FORMAT_INDEX + (self.num_formats.len() - 1) as u16
    }

    /// Appends every FONT record (five built-ins, repeating Excel's
    /// default font five times the way the reference writer does, then
    /// each distinct user font) to `acc`.
    pub fn emit_fonts(&self, acc: &mut crate::stream::StreamAccumulator) -> std::io::Result<()> {
        let default_font = FormatDesc::default();
        for _ in 0..5 {
            let payload = default_font.font_payload();
            crate::record::append_record(acc, records::FONT, &payload)?;
        }
        for (_, f) in &self.fonts {
            let payload = f.font_payload();
            crate::record::append_record(acc, records::FONT, &payload)?;
        }
        Ok(())
    }

    /// Appends one FORMAT record per distinct user number-format string.
    pub fn emit_num_formats(&self, acc: &mut crate::stream::StreamAccumulator) -> std::io::Result<()> {
        for (i, s) in self.num_formats.iter().enumerate() {
            let idx = FIRST_USER_NUM_FORMAT_INDEX + i as u16;
            let mut p = OctetBuffer::with_capacity(3 + s.len());
            p.put_u16_le(idx);
            p.put_u8(s.len() as u8);
            p.append(s.as_bytes());
            crate::record::append_record(acc, records::FORMAT, &p)?;
        }
        Ok(())
    }

    /// Appends the 15 built-in style XFs, the blank default cell XF, and
    /// one cell XF per workbook format (in add-order, after [`Self::resolve`]
    /// has been called on each).
    pub fn emit_xfs(&self, formats: &[FormatDesc], acc: &mut crate::stream::StreamAccumulator) -> std::io::Result<()> {
        let style_desc = FormatDesc::default();
        for _ in 0..BUILTIN_STYLE_XF_COUNT {
            let payload = style_desc.xf_payload(0xFFF5);
            crate::record::append_record(acc, records::XF, &payload)?;
        }
        // default blank cell XF, parented to style XF 0
        let blank = style_desc.xf_payload(0x0001);
        crate::record::append_record(acc, records::XF, &blank)?;

        for fmt in formats {
            let payload = fmt.xf_payload(0x0001);
            crate::record::append_record(acc, records::XF, &payload)?;
        }
        Ok(())
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    pub fn num_format_count(&self) -> usize {
        self.num_formats.len()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Font index 4 is reserved by Excel (never emitted for user fonts); the
/// five built-ins occupy 0-4 and user fonts start at 6.
fn font_slot_to_index(slot: usize) -> u16 {
    FIRST_USER_FONT_INDEX + slot as u16
}
