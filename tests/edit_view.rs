mod common;

use std::sync::Arc;

use common::view;
use docpack::edit::{
    AttribId, AttribValue, ESelection, EditConfig, EditEngine, EditView, FieldData, FieldKind,
    ItemSet, MemoryClipboard, ReadFormat,
};
use docpack::lingu::{
    AutoCorrectList, Dictionary, LanguageType, LinguSettings, LinguisticServices,
    MemoryDictionaryList, PopupAction, SpellCallbackCommand, SpellCallbackInfo,
    WordListSpellChecker,
};
use docpack::lingu::dictionary::STANDARD_DICTIONARY;
use docpack::lingu::AutoCorrect;
use docpack::EditError;

#[test]
fn insert_over_selection_selects_new_text() {
    let mut v = view("0123456789");
    v.set_selection(ESelection::new(0, 0, 0, 5));
    v.insert_text("XY", true).unwrap();

    assert_eq!(v.engine().full_text(), "XY56789");
    assert_eq!(v.selection(), ESelection::new(0, 0, 0, 2));
}

#[test]
fn undo_and_redo_walk_the_history() {
    let mut v = view("alpha\nbeta");
    v.set_selection(ESelection::at(0, 5));
    v.insert_text(" one", false).unwrap();
    v.insert_para_break().unwrap();
    v.insert_text("two", false).unwrap();
    assert_eq!(v.engine().full_text(), "alpha one\ntwo\nbeta");

    assert!(v.undo().unwrap());
    assert_eq!(v.engine().full_text(), "alpha one\n\nbeta");
    assert!(v.undo().unwrap());
    assert_eq!(v.engine().full_text(), "alpha one\nbeta");
    assert_eq!(v.selection(), ESelection::at(0, 9));
    assert!(v.undo().unwrap());
    assert_eq!(v.engine().full_text(), "alpha\nbeta");
    assert!(!v.undo().unwrap());

    assert!(v.redo().unwrap());
    assert!(v.redo().unwrap());
    assert_eq!(v.engine().full_text(), "alpha one\n\nbeta");

    // a new edit drops the redo branch
    v.insert_text("x", false).unwrap();
    assert!(!v.engine().has_redo());
}

#[test]
fn disabled_undo_records_nothing() {
    let config = EditConfig {
        undo_enabled: false,
        ..EditConfig::default()
    };
    let mut engine = EditEngine::new(config, LinguisticServices::default());
    engine.set_text("abc");
    let mut v = EditView::new(engine);
    v.insert_text("x", false).unwrap();
    assert!(!v.engine().has_undo());
    assert!(!v.undo().unwrap());
}

#[test]
fn clipboard_is_shared_between_views() {
    let clipboard = Arc::new(MemoryClipboard::new());
    let mut source = view("bold words").with_clipboard(clipboard.clone());
    let mut target = view("").with_clipboard(clipboard);

    let mut bold = ItemSet::new();
    bold.put(AttribId::CharWeight, AttribValue::Int(700));
    source.set_selection(ESelection::new(0, 0, 0, 4));
    source.set_attribs(&bold).unwrap();
    source.copy().unwrap();
    assert_eq!(source.engine().full_text(), "bold words");

    target.paste().unwrap();
    assert_eq!(target.engine().full_text(), "bold");
    let node = target.engine().doc().get(0).unwrap();
    assert_eq!(node.value_at(AttribId::CharWeight, 1), Some(&AttribValue::Int(700)));

    target.set_selection(ESelection::at(0, 4));
    target.paste_special(true).unwrap();
    assert_eq!(target.engine().full_text(), "boldbold");
    let node = target.engine().doc().get(0).unwrap();
    assert_eq!(node.value_at(AttribId::CharWeight, 5), None);
}

#[test]
fn native_read_keeps_fields() {
    let mut source = view("Page ");
    source.set_selection(ESelection::at(0, 5));
    source.insert_field(FieldData::new(FieldKind::PageNumber)).unwrap();
    source.set_selection(ESelection::new(0, 0, 0, 6));
    let json = source.create_text_object().unwrap().to_json().unwrap();

    let mut target = view("");
    target.engine_mut().set_page_info(3, 9);
    target.read(&json, ReadFormat::Native).unwrap();
    assert_eq!(target.engine().text(0).unwrap(), "Page 3");
    assert_eq!(target.engine().field_count(0).unwrap(), 1);

    let err = target.read("{broken", ReadFormat::Native).unwrap_err();
    assert!(matches!(err, EditError::TextObject(_)));
}

#[test]
fn read_only_view_still_copies() {
    let mut v = view("keep me");
    v.set_read_only(true);
    v.set_selection(ESelection::new(0, 0, 0, 4));
    v.copy().unwrap();
    assert!(matches!(v.cut(), Err(EditError::ReadOnly)));
    assert!(matches!(v.paste(), Err(EditError::ReadOnly)));
    assert_eq!(v.engine().full_text(), "keep me");
}

fn spelling_view(text: &str) -> (EditView, Arc<MemoryDictionaryList>, Arc<AutoCorrectList>) {
    let speller = WordListSpellChecker::new().with_words(
        LanguageType::ENGLISH_US,
        ["hello", "world", "word", "there"],
    );
    let dictionaries = Arc::new(MemoryDictionaryList::new());
    let auto_correct = Arc::new(AutoCorrectList::new());
    let lingu = LinguisticServices::new(LinguSettings::default())
        .with_spell_checker(Arc::new(speller))
        .with_dictionaries(dictionaries.clone())
        .with_auto_correct(auto_correct.clone());
    let mut engine = EditEngine::new(EditConfig::default(), lingu);
    engine.set_text(text);
    (EditView::new(engine), dictionaries, auto_correct)
}

#[test]
fn spell_popup_offers_suggestions() {
    let (mut v, _, _) = spelling_view("hello wrold");
    v.set_selection(ESelection::at(0, 2));

    assert!(v.build_spell_popup(0, 1).unwrap().is_none());
    let popup = v.build_spell_popup(0, 8).unwrap().unwrap();
    assert_eq!(popup.word, "wrold");
    assert_eq!(popup.language, LanguageType::ENGLISH_US);
    assert!(popup.suggestions.contains(&"world".to_string()));
    assert!(popup.has_add());
    assert_eq!(popup.dictionaries[0].1, STANDARD_DICTIONARY);
    assert_eq!(v.selection(), ESelection::at(0, 2));

    v.set_selection(ESelection::at(0, 8));
    assert!(v.is_cursor_at_wrong_spelled_word().unwrap());
}

#[test]
fn spell_popup_replace_and_auto_correct() {
    let (mut v, _, table) = spelling_view("hello wrold");
    let popup = v.build_spell_popup(0, 7).unwrap().unwrap();
    let index = popup
        .suggestions
        .iter()
        .position(|s| s == "world")
        .unwrap();

    let mut calls = Vec::new();
    let done = v
        .execute_spell_popup(0, 7, PopupAction::AutoCorrect(index), &mut |info| calls.push(info))
        .unwrap();
    assert!(done);
    assert!(calls.is_empty());
    assert_eq!(v.engine().full_text(), "hello world");
    assert_eq!(
        table.lookup("wrold", LanguageType::ENGLISH_US),
        Some("world".to_string())
    );
    assert!(!v.is_wrong_spelled_word_at(0, 7, false).unwrap());
}

#[test]
fn spell_popup_add_and_ignore() {
    let (mut v, dictionaries, _) = spelling_view("helo zorp");
    let mut calls: Vec<SpellCallbackInfo> = Vec::new();

    assert!(v
        .execute_spell_popup(0, 6, PopupAction::Add, &mut |info| calls.push(info))
        .unwrap());
    assert_eq!(calls[0].command, SpellCallbackCommand::AddToDictionary);
    assert_eq!(calls[0].word, "zorp");
    assert!(dictionaries.get(STANDARD_DICTIONARY).unwrap().words.contains("zorp"));
    assert!(!v.is_wrong_spelled_word_at(0, 6, false).unwrap());

    assert!(v
        .execute_spell_popup(0, 1, PopupAction::Ignore, &mut |info| calls.push(info))
        .unwrap());
    assert_eq!(calls[1].command, SpellCallbackCommand::IgnoreWord);
    assert_eq!(calls[1].word, "helo");
    assert!(!v.is_wrong_spelled_word_at(0, 1, false).unwrap());
    assert_eq!(v.engine().full_text(), "helo zorp");

    assert!(!v
        .execute_spell_popup(0, 1, PopupAction::Cancel, &mut |info| calls.push(info))
        .unwrap());
    assert_eq!(calls.len(), 2);
}

#[test]
fn read_only_dictionaries_are_not_offered() {
    let (mut v, dictionaries, _) = spelling_view("zorp");
    dictionaries.push(Dictionary::new("names.dic", LanguageType::ENGLISH_US));
    dictionaries.push(Dictionary::new("locked.dic", LanguageType::ENGLISH_US).read_only());
    dictionaries.push(Dictionary::new("german.dic", LanguageType::GERMAN));

    let popup = v.build_spell_popup(0, 1).unwrap().unwrap();
    let names: Vec<&str> = popup.dictionaries.iter().map(|(_, n)| n.as_str()).collect();
    assert_eq!(names, [STANDARD_DICTIONARY, "names.dic"]);
    assert!(popup.has_insert_menu());

    let mut calls = Vec::new();
    assert!(!v
        .execute_spell_popup(0, 1, PopupAction::AddTo("locked.dic".into()), &mut |i| calls.push(i))
        .unwrap());
    assert!(v
        .execute_spell_popup(0, 1, PopupAction::AddTo("names.dic".into()), &mut |i| calls.push(i))
        .unwrap());
    assert!(dictionaries.get("names.dic").unwrap().words.contains("zorp"));
}

#[test]
fn complete_auto_correct_uses_table() {
    let (mut v, _, table) = spelling_view("teh");
    table.put_text("teh", "the", LanguageType::ENGLISH_US);
    v.engine_mut().set_auto_correct(true);
    v.set_selection(ESelection::at(0, 3));
    v.complete_auto_correct().unwrap();
    assert_eq!(v.engine().full_text(), "the");
}
