mod common;

use common::view;
use docpack::edit::{ESelection, EditView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Character offset of `(para, pos)` in the text joined by `\n`.
fn flat(text: &str, para: usize, pos: usize) -> usize {
    text.split('\n').take(para).map(|p| p.chars().count() + 1).sum::<usize>() + pos
}

fn random_selection(rng: &mut StdRng, v: &EditView) -> ESelection {
    let count = v.engine().paragraph_count();
    let mut point = || {
        let para = rng.gen_range(0..count);
        let len = v.engine().paragraph_len(para).unwrap();
        (para, rng.gen_range(0..=len))
    };
    let (sp, si) = point();
    let (ep, ei) = point();
    ESelection::new(sp, si, ep, ei)
}

fn splice(text: &str, sel: ESelection, insert: &str) -> String {
    let sel = sel.adjusted();
    let chars: Vec<char> = text.chars().collect();
    let a = flat(text, sel.start_para, sel.start_pos);
    let b = flat(text, sel.end_para, sel.end_pos);
    chars[..a]
        .iter()
        .chain(insert.chars().collect::<Vec<_>>().iter())
        .chain(chars[b..].iter())
        .collect()
}

#[test]
fn selections_clamp_into_the_document() {
    let mut v = view("short\nlonger line\n");
    v.set_selection(ESelection::new(7, 99, 1, 99));
    assert_eq!(v.selection(), ESelection::new(2, 0, 1, 11));
    v.set_selection(ESelection::all());
    assert_eq!(v.selection(), ESelection::new(0, 0, 2, 0));
    assert_eq!(v.selected().unwrap(), "short\nlonger line\n");
}

#[test]
fn random_edits_match_a_plain_text_model_and_undo_fully() {
    let original = "The quick brown fox\njumps over\n\nthe lazy dog";
    let mut rng = StdRng::seed_from_u64(7);
    let mut v = view(original);
    let mut model = original.to_string();
    let words = ["a", "bc", "déf", "  ", "ghij"];

    for step in 0..60 {
        let sel = random_selection(&mut rng, &v);
        v.set_selection(sel);
        assert_eq!(v.selection(), sel, "step {step}");

        match rng.gen_range(0..3) {
            0 => {
                let word = words[rng.gen_range(0..words.len())];
                v.insert_text(word, rng.gen_bool(0.5)).unwrap();
                model = splice(&model, sel, word);
            }
            1 => {
                v.delete_selected().unwrap();
                model = splice(&model, sel, "");
            }
            _ => {
                v.insert_para_break().unwrap();
                model = splice(&model, sel, "\n");
            }
        }
        assert_eq!(v.engine().full_text(), model, "step {step}");

        let now = v.selection();
        assert!(now.start_para < v.engine().paragraph_count());
        assert!(now.end_pos <= v.engine().paragraph_len(now.end_para).unwrap());
    }

    while v.undo().unwrap() {}
    assert_eq!(v.engine().full_text(), original);
    while v.redo().unwrap() {}
    assert_eq!(v.engine().full_text(), model);
}

#[test]
fn hidden_paragraphs_are_never_selected() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut v = view("zero\none\ntwo\nthree\nfour\nfive");
    for para in [1, 2, 4] {
        v.engine_mut().set_paragraph_visible(para, false).unwrap();
    }

    for _ in 0..200 {
        let sel = random_selection(&mut rng, &v);
        v.set_selection(sel);
        let got = v.selection();
        for para in [got.start_para, got.end_para] {
            assert!(v.engine().doc().get(para).unwrap().is_visible(), "{sel:?} -> {got:?}");
        }
    }

    v.set_selection(ESelection::at(2, 1));
    assert_eq!(v.selection(), ESelection::at(0, 4));
    v.set_selection(ESelection::new(3, 0, 4, 2));
    assert_eq!(v.selection(), ESelection::new(3, 0, 3, 5));
}

#[test]
fn stale_selection_falls_back_to_start() {
    let mut v = view("one\ntwo\nthree");
    v.set_selection(ESelection::new(2, 1, 2, 3));
    v.engine_mut().set_text("fresh");
    assert_eq!(v.selection(), ESelection::default());
    assert_eq!(v.selected().unwrap(), "");
    assert_eq!(v.selection(), ESelection::at(0, 0));
}

#[test]
fn adjust_orders_and_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(0xad);
    let v = view("first paragraph\n\nthird one here\nx");
    let doc = v.engine().doc();
    for _ in 0..300 {
        let sel = random_selection(&mut rng, &v);
        let once = sel.adjusted();
        assert!(once.is_adjusted());
        assert_eq!(once.adjusted(), once);

        let live = doc.convert_selection(&sel).adjusted(doc).unwrap();
        assert_eq!(doc.eselection(&live).unwrap(), once);
    }
}
