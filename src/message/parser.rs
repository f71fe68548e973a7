use super::header::*;
use super::name::*;
use super::question::*;
use super::resource::*;
use super::*;
use crate::error::*;

// A Parser allows incrementally parsing a DNS message.
//
// Sections must be parsed in order: questions, then answers. Calling an
// accessor for a later section implicitly requires the earlier sections to
// have been walked or skipped; once a section is exhausted its accessors
// return ErrSectionDone.
#[derive(Default)]
pub(crate) struct Parser<'a> {
    msg: &'a [u8],
    header: HeaderInternal,
    section: Section,
    off: usize,
    index: usize,
    res_header_valid: bool,
    res_header: ResourceHeader,
}

impl<'a> Parser<'a> {
    // start parses the header and enables the parsing of questions.
    pub(crate) fn start(&mut self, msg: &'a [u8]) -> Result<Header> {
        let mut header = HeaderInternal::default();
        let off = header.unpack(msg, 0)?;
        *self = Parser {
            msg,
            header,
            section: Section::Questions,
            off,
            ..Parser::default()
        };
        Ok(self.header.header())
    }

    fn check_advance(&mut self, sec: Section) -> Result<()> {
        if self.section < sec {
            return Err(Error::ErrNotStarted);
        }
        if self.section > sec {
            return Err(Error::ErrSectionDone);
        }
        self.res_header_valid = false;
        if self.index == self.header.count(sec) as usize {
            self.index = 0;
            self.section = self.section.next();
            return Err(Error::ErrSectionDone);
        }
        Ok(())
    }

    fn resource(&mut self, sec: Section) -> Result<Resource> {
        let header = self.resource_header(sec)?;
        self.res_header_valid = false;
        let (body, off) =
            unpack_resource_body(header.typ, self.msg, self.off, header.length as usize)?;
        self.off = off;
        self.index += 1;
        Ok(Resource {
            header,
            body: Some(body),
        })
    }

    fn resource_header(&mut self, sec: Section) -> Result<ResourceHeader> {
        if self.res_header_valid {
            return Ok(self.res_header.clone());
        }
        self.check_advance(sec)?;
        let mut hdr = ResourceHeader::default();
        let off = hdr.unpack(self.msg, self.off)?;
        self.res_header_valid = true;
        self.res_header = hdr.clone();
        self.off = off;
        Ok(hdr)
    }

    fn skip_resource(&mut self, sec: Section) -> Result<()> {
        if self.res_header_valid {
            let new_off = self.off + self.res_header.length as usize;
            if new_off > self.msg.len() {
                return Err(Error::ErrResourceLen);
            }
            self.off = new_off;
            self.res_header_valid = false;
            self.index += 1;
            return Ok(());
        }
        self.check_advance(sec)?;
        self.off = Resource::skip(self.msg, self.off)?;
        self.index += 1;
        Ok(())
    }

    // question parses a single question.
    pub(crate) fn question(&mut self) -> Result<Question> {
        self.check_advance(Section::Questions)?;

        let mut name = Name::default();
        let off = name.unpack(self.msg, self.off)?;
        let mut typ = DnsType::default();
        let off = typ.unpack(self.msg, off)?;
        let mut class = DnsClass::default();
        let off = class.unpack(self.msg, off)?;
        self.off = off;
        self.index += 1;
        Ok(Question { name, typ, class })
    }

    // all_questions parses all questions.
    pub(crate) fn all_questions(&mut self) -> Result<Vec<Question>> {
        let mut qs = Vec::with_capacity(self.header.questions as usize);
        loop {
            match self.question() {
                Ok(q) => qs.push(q),
                Err(Error::ErrSectionDone) => return Ok(qs),
                Err(err) => return Err(err),
            }
        }
    }

    // skip_question advances past a single question.
    pub(crate) fn skip_question(&mut self) -> Result<()> {
        self.check_advance(Section::Questions)?;
        self.off = Question::skip(self.msg, self.off)?;
        self.index += 1;
        Ok(())
    }

    // skip_all_questions advances past the remainder of the question section.
    pub(crate) fn skip_all_questions(&mut self) -> Result<()> {
        loop {
            match self.skip_question() {
                Err(Error::ErrSectionDone) => return Ok(()),
                Err(err) => return Err(err),
                Ok(_) => {}
            }
        }
    }

    // answer_header parses the header of the next answer without touching the
    // resource data. Repeated calls return the same header until the answer is
    // consumed with answer() or skip_answer().
    pub(crate) fn answer_header(&mut self) -> Result<ResourceHeader> {
        self.resource_header(Section::Answers)
    }

    // answer materializes the answer whose header was last parsed.
    pub(crate) fn answer(&mut self) -> Result<Resource> {
        self.resource(Section::Answers)
    }

    // skip_answer advances past a single answer's resource data.
    pub(crate) fn skip_answer(&mut self) -> Result<()> {
        self.skip_resource(Section::Answers)
    }

    // all_answers parses the rest of the answer section, materializing the A
    // and SRV records and skipping everything else.
    pub(crate) fn all_answers(&mut self) -> Result<Vec<Resource>> {
        let mut answers = Vec::with_capacity(self.header.answers as usize);
        loop {
            match self.answer_header() {
                Ok(header) => {
                    if header.typ == DnsType::A || header.typ == DnsType::Srv {
                        answers.push(self.answer()?);
                    } else {
                        self.skip_answer()?;
                    }
                }
                Err(Error::ErrSectionDone) => return Ok(answers),
                Err(err) => return Err(err),
            }
        }
    }
}
