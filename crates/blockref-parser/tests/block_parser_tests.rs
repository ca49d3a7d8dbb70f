//! Block parser behaviour over whole outline files

use blockref_parser::{parse_blocks, BlockParser, BlockRecord};
use proptest::prelude::*;

fn block_id(n: usize) -> String {
    format!("{n:08x}-0000-4000-8000-{n:012x}")
}

#[test]
fn test_end_to_end_page() {
    let content = "- First block\n  id:: 11111111-1111-1111-1111-111111111111\n- Refers to ((11111111-1111-1111-1111-111111111111))\n";
    let parsed = parse_blocks("page.md", content);

    assert_eq!(parsed.len(), 1);
    assert_eq!(
        parsed.get("11111111-1111-1111-1111-111111111111"),
        Some(&BlockRecord::new("page.md", "First block", 0))
    );
}

#[test]
fn test_hierarchy() {
    let a = block_id(1);
    let b = block_id(2);
    let content = format!("- A\n  id:: {a}\n  - B\n    id:: {b}\n");
    let parsed = parse_blocks("page.md", &content);

    assert_eq!(parsed.get(&a).unwrap().children_ids, vec![b.clone()]);
    assert_eq!(parsed.get(&b).unwrap().start_line, 2);
}

#[test]
fn test_unaddressable_child_does_not_break_siblings() {
    let parent = block_id(1);
    let second = block_id(2);
    let content = format!(
        "- Parent\n  id:: {parent}\n  - No id here\n    - Deep, no id\n  - Second child\n    id:: {second}\n- Top level, no id\n"
    );
    let parsed = parse_blocks("page.md", &content);

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed.get(&parent).unwrap().children_ids, vec![second]);
}

#[test]
fn test_document_order_is_preserved() {
    let content: String = (0..5)
        .map(|i| format!("- item {i}\n  id:: {}\n", block_id(i)))
        .collect();
    let parsed = BlockParser::new().parse("list.md", &content);

    let ids: Vec<String> = parsed.ids().map(str::to_string).collect();
    let expected: Vec<String> = (0..5).map(block_id).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_deeper_property_after_child_belongs_to_child() {
    let parent = block_id(1);
    let child = block_id(2);
    let content = format!("- Parent\n  id:: {parent}\n  - Child\n    id:: {child}\n    status:: done\n");
    let parsed = parse_blocks("page.md", &content);

    assert_eq!(parsed.get(&parent).unwrap().raw_content, "Parent");
    assert_eq!(parsed.get(&child).unwrap().raw_content, "Child\n    status:: done");
}

#[test]
fn test_dedent_past_several_levels() {
    let ids: Vec<String> = (1..=4).map(block_id).collect();
    let content = format!(
        "- L0\n  id:: {}\n  - L1\n    id:: {}\n      - L2\n        id:: {}\n  - L1 again\n    id:: {}\n",
        ids[0], ids[1], ids[2], ids[3]
    );
    let parsed = parse_blocks("page.md", &content);

    assert_eq!(parsed.get(&ids[0]).unwrap().children_ids, vec![ids[1].clone(), ids[3].clone()]);
    assert_eq!(parsed.get(&ids[1]).unwrap().children_ids, vec![ids[2].clone()]);
}

fn outline_line() -> impl Strategy<Value = (usize, String, bool)> {
    (0usize..4, "[a-z][a-z ]{0,15}", any::<bool>())
}

fn render_outline(lines: &[(usize, String, bool)]) -> String {
    let mut content = String::new();
    for (i, (depth, text, has_id)) in lines.iter().enumerate() {
        let indent = "  ".repeat(*depth);
        content.push_str(&format!("{indent}- {text}\n"));
        if *has_id {
            content.push_str(&format!("{indent}  id:: {}\n", block_id(i)));
        }
    }
    content
}

proptest! {
    /// Property: parsing is deterministic
    #[test]
    fn parse_is_idempotent(lines in prop::collection::vec(outline_line(), 0..30)) {
        let content = render_outline(&lines);
        prop_assert_eq!(parse_blocks("f.md", &content), parse_blocks("f.md", &content));
    }

    /// Property: a flat list yields one childless record per bullet
    #[test]
    fn flat_list_round_trips(texts in prop::collection::vec("[a-z][a-z ]{0,15}", 1..30)) {
        let content: String = texts
            .iter()
            .enumerate()
            .map(|(i, text)| format!("- {text}\n  id:: {}\n", block_id(i)))
            .collect();
        let parsed = parse_blocks("flat.md", &content);

        prop_assert_eq!(parsed.len(), texts.len());
        for (i, text) in texts.iter().enumerate() {
            let block = parsed.get(&block_id(i)).unwrap();
            prop_assert_eq!(&block.raw_content, text);
            prop_assert_eq!(block.start_line, i * 2);
            prop_assert!(block.children_ids.is_empty());
        }
    }

    /// Property: children are always emitted blocks that start after their parent
    #[test]
    fn children_follow_parents(lines in prop::collection::vec(outline_line(), 0..30)) {
        let content = render_outline(&lines);
        let parsed = parse_blocks("f.md", &content);

        for entry in &parsed {
            for child in &entry.block.children_ids {
                let child_block = parsed.get(child);
                prop_assert!(child_block.is_some());
                prop_assert!(child_block.unwrap().start_line > entry.block.start_line);
            }
        }
    }
}
